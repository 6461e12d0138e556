use apollo_compiler::Node;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::ast::VariableDefinition;
use serde_json_bytes::Value;

use crate::Object;
use crate::arguments::resolve_value;

pub(crate) struct IncludeDirective {
    pub(crate) is_included: bool,
}

impl IncludeDirective {
    pub(crate) fn from_directives(
        directives: &DirectiveList,
        variables: &Object,
        variable_definitions: &[Node<VariableDefinition>],
    ) -> Option<Self> {
        condition(directives, "include", variables, variable_definitions)
            .map(|cond| Self { is_included: cond })
    }
}

pub(crate) struct SkipDirective {
    pub(crate) is_skipped: bool,
}

impl SkipDirective {
    pub(crate) fn from_directives(
        directives: &DirectiveList,
        variables: &Object,
        variable_definitions: &[Node<VariableDefinition>],
    ) -> Option<Self> {
        condition(directives, "skip", variables, variable_definitions)
            .map(|cond| Self { is_skipped: cond })
    }
}

/// Reads the `if` argument of `@skip` or `@include`, substituting variables.
fn condition(
    directives: &DirectiveList,
    name: &str,
    variables: &Object,
    variable_definitions: &[Node<VariableDefinition>],
) -> Option<bool> {
    let argument = directives.get(name)?.specified_argument_by_name("if")?;
    match resolve_value(argument, variables, variable_definitions)? {
        Value::Bool(cond) => Some(cond),
        _ => None,
    }
}

/// Whether `@skip(if: true)` or `@include(if: false)` removes the selection from the operation.
pub(crate) fn skipped_by_directives(
    directives: &DirectiveList,
    variables: &Object,
    variable_definitions: &[Node<VariableDefinition>],
) -> bool {
    if let Some(IncludeDirective { is_included: false }) =
        IncludeDirective::from_directives(directives, variables, variable_definitions)
    {
        return true;
    }

    if let Some(SkipDirective { is_skipped: true }) =
        SkipDirective::from_directives(directives, variables, variable_definitions)
    {
        return true;
    }

    false
}
