//! Argument values of field occurrences, resolved against request variables and schema defaults.
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::VariableDefinition;
use apollo_compiler::executable::Field;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

use crate::Object;

/// Returns the arguments of `field` as a JSON object.
///
/// Each argument defined on the field takes, in order of preference: the value written in the
/// operation (with variables substituted), the default value from the argument definition.
/// Arguments that resolve to nothing are left out.
pub fn resolve_field_arguments(
    field: &Field,
    variables: &Object,
    variable_definitions: &[Node<VariableDefinition>],
) -> Object {
    let mut arguments = Object::new();
    for definition in &field.definition.arguments {
        let value = field
            .arguments
            .iter()
            .find(|argument| argument.name == definition.name)
            .and_then(|argument| resolve_value(&argument.value, variables, variable_definitions))
            .or_else(|| {
                definition
                    .default_value
                    .as_ref()
                    .and_then(|default| resolve_value(default, variables, &[]))
            });
        if let Some(value) = value {
            arguments.insert(ByteString::from(definition.name.as_str()), value);
        }
    }
    arguments
}

/// Converts a GraphQL input value to JSON.
///
/// A variable resolves to its value in `variables`, then to the default of its definition.
/// Unknown variables yield `None`; inside lists and objects they are dropped.
pub fn resolve_value(
    value: &ast::Value,
    variables: &Object,
    variable_definitions: &[Node<VariableDefinition>],
) -> Option<Value> {
    match value {
        ast::Value::Null => Some(Value::Null),
        ast::Value::Enum(name) => Some(Value::String(ByteString::from(name.as_str()))),
        ast::Value::Variable(name) => variables.get(name.as_str()).cloned().or_else(|| {
            variable_definitions
                .iter()
                .find(|definition| definition.name == *name)
                .and_then(|definition| definition.default_value.as_ref())
                .and_then(|default| resolve_value(default, variables, &[]))
        }),
        ast::Value::String(s) => Some(Value::String(ByteString::from(s.as_str()))),
        ast::Value::Float(f) => f
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ast::Value::Int(i) => i
            .as_str()
            .parse::<i64>()
            .ok()
            .map(|i| Value::Number(i.into()))
            .or_else(|| {
                i.try_to_f64()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }),
        ast::Value::Boolean(b) => Some(Value::Bool(*b)),
        ast::Value::List(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| resolve_value(item, variables, variable_definitions))
                .collect(),
        )),
        ast::Value::Object(fields) => Some(Value::Object(
            fields
                .iter()
                .filter_map(|(name, value)| {
                    resolve_value(value, variables, variable_definitions)
                        .map(|value| (ByteString::from(name.as_str()), value))
                })
                .collect(),
        )),
    }
}

/// Extracts the multiplier values named by `paths` from resolved field arguments.
///
/// A path is a list of keys separated by dots, walked into nested input objects. Integers and
/// numeric strings count as themselves, floats are truncated and lists count as their length.
/// Anything else, including negative numbers and missing arguments, is skipped.
pub fn multiplier_values(paths: &[String], arguments: &Object) -> Vec<u64> {
    paths
        .iter()
        .filter_map(|path| {
            let multiplier = lookup_path(arguments, path).and_then(as_multiplier);
            if multiplier.is_none() {
                tracing::trace!(path = %path, "multiplier argument is missing or not numeric");
            }
            multiplier
        })
        .collect()
}

fn lookup_path<'a>(arguments: &'a Object, path: &str) -> Option<&'a Value> {
    let mut keys = path.split('.');
    let mut value = arguments.get(keys.next()?)?;
    for key in keys {
        value = value.as_object()?.get(key)?;
    }
    Some(value)
}

fn as_multiplier(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        Value::String(s) => s.as_str().trim().parse().ok(),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    }
}
