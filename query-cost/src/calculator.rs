use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::ast::NamedType;
use apollo_compiler::ast::VariableDefinition;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::FragmentSpread;
use apollo_compiler::executable::InlineFragment;
use apollo_compiler::executable::Operation;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::validation::Valid;

use crate::Object;
use crate::arguments::multiplier_values;
use crate::arguments::resolve_field_arguments;
use crate::cost_map::CostMap;
use crate::cost_map::FieldCost;
use crate::directives::skipped_by_directives;
use crate::error::QueryCostError;

/// Tuning knobs for [`QueryCostCalculator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalculatorOptions {
    /// Complexity of cost map entries that do not set one.
    pub default_complexity: u64,
    /// Cost of fields that have no cost map entry.
    pub default_cost: u64,
    /// Drop selections excluded by `@skip` / `@include` from the estimate. When false every
    /// selection in the document is counted.
    pub respect_conditional_directives: bool,
}

impl Default for CalculatorOptions {
    fn default() -> Self {
        Self {
            default_complexity: 1,
            default_cost: 0,
            respect_conditional_directives: false,
        }
    }
}

/// What the selection walk needs to know about the operation being scored.
struct ScoringContext<'a> {
    document: &'a ExecutableDocument,
    variables: &'a Object,
    variable_definitions: &'a [Node<VariableDefinition>],
}

/// Estimates the cost of GraphQL operations from a static [`CostMap`].
///
/// Every field with a cost map entry costs its complexity times the product of the list-size
/// multipliers of its ancestors (and its own). Fields without an entry cost the default cost.
/// Costs are counted per occurrence in the document: aliases, repeated fragment spreads and
/// inline fragments selecting the same field are each counted in full.
#[derive(Clone, Debug)]
pub struct QueryCostCalculator {
    cost_map: Arc<CostMap>,
    options: CalculatorOptions,
}

impl QueryCostCalculator {
    pub fn new(cost_map: Arc<CostMap>, options: CalculatorOptions) -> Self {
        Self { cost_map, options }
    }

    pub fn cost_map(&self) -> &CostMap {
        &self.cost_map
    }

    pub fn options(&self) -> CalculatorOptions {
        self.options
    }

    /// Sum of the cost of every operation in `document`.
    pub fn estimated(
        &self,
        document: &Valid<ExecutableDocument>,
        schema: &Valid<Schema>,
        variables: &Object,
    ) -> Result<u64, QueryCostError> {
        self.cost_map.validate(schema)?;
        if self.cost_map.is_empty() {
            return Ok(0);
        }

        let mut cost: u64 = 0;
        for operation in document.operations.iter() {
            let operation_cost = self.score_operation(operation, schema, document, variables)?;
            cost = cost.saturating_add(operation_cost);
        }
        Ok(cost)
    }

    /// Cost of the single operation selected by `operation_name`.
    pub fn estimated_operation(
        &self,
        document: &Valid<ExecutableDocument>,
        operation_name: Option<&str>,
        schema: &Valid<Schema>,
        variables: &Object,
    ) -> Result<u64, QueryCostError> {
        self.cost_map.validate(schema)?;
        let operation = document.operations.get(operation_name).map_err(|_| {
            QueryCostError::OperationNotFound(operation_name.unwrap_or("<anonymous>").to_string())
        })?;
        if self.cost_map.is_empty() {
            return Ok(0);
        }
        self.score_operation(operation, schema, document, variables)
    }

    fn score_operation(
        &self,
        operation: &Operation,
        schema: &Valid<Schema>,
        document: &ExecutableDocument,
        variables: &Object,
    ) -> Result<u64, QueryCostError> {
        let Some(root_type_name) = schema.root_operation(operation.operation_type) else {
            return Err(QueryCostError::UnsupportedOperation {
                operation_type: operation.operation_type.to_string(),
            });
        };

        let ctx = ScoringContext {
            document,
            variables,
            variable_definitions: &operation.variables,
        };
        let mut multipliers = Vec::new();
        let cost = self.score_selection_set(
            &operation.selection_set,
            root_type_name,
            &mut multipliers,
            &ctx,
        )?;
        tracing::debug!(
            operation = operation.name.as_ref().map(|name| name.as_str()),
            operation_type = %operation.operation_type,
            cost,
            "estimated operation cost"
        );
        Ok(cost)
    }

    fn score_selection_set(
        &self,
        selection_set: &SelectionSet,
        parent_type: &NamedType,
        multipliers: &mut Vec<u64>,
        ctx: &ScoringContext<'_>,
    ) -> Result<u64, QueryCostError> {
        let mut cost: u64 = 0;
        for selection in selection_set.selections.iter() {
            let selection_cost = self.score_selection(selection, parent_type, multipliers, ctx)?;
            cost = cost.saturating_add(selection_cost);
        }
        Ok(cost)
    }

    fn score_selection(
        &self,
        selection: &Selection,
        parent_type: &NamedType,
        multipliers: &mut Vec<u64>,
        ctx: &ScoringContext<'_>,
    ) -> Result<u64, QueryCostError> {
        match selection {
            Selection::Field(f) => self.score_field(f, parent_type, multipliers, ctx),
            Selection::FragmentSpread(s) => self.score_fragment_spread(s, multipliers, ctx),
            Selection::InlineFragment(i) => self.score_inline_fragment(
                i,
                i.type_condition.as_ref().unwrap_or(parent_type),
                multipliers,
                ctx,
            ),
        }
    }

    /// Scores a field and everything selected below it.
    ///
    /// Multipliers pushed for this field are in scope for its subselections only; the stack is
    /// restored before returning so siblings see the multipliers of the parent.
    fn score_field(
        &self,
        field: &Field,
        parent_type: &NamedType,
        multipliers: &mut Vec<u64>,
        ctx: &ScoringContext<'_>,
    ) -> Result<u64, QueryCostError> {
        if self.is_skipped(&field.directives, ctx) {
            return Ok(0);
        }

        let depth = multipliers.len();
        let field_cost = match self.cost_map.field_cost(parent_type, &field.name) {
            Some(entry) => self.score_cost_map_entry(entry, field, multipliers, ctx),
            None => self.options.default_cost,
        };
        let children_cost = self.score_selection_set(
            &field.selection_set,
            field.ty().inner_named_type(),
            multipliers,
            ctx,
        );
        multipliers.truncate(depth);
        let children_cost = children_cost?;

        let cost = field_cost.saturating_add(children_cost);
        tracing::debug!(
            "Field {}.{} cost breakdown: (field) {} + (selections) {} = {}",
            parent_type,
            field.response_key(),
            field_cost,
            children_cost,
            cost
        );
        Ok(cost)
    }

    /// `complexity * product(multipliers)`, after pushing this field's own multiplier when its
    /// arguments provide one.
    fn score_cost_map_entry(
        &self,
        entry: &FieldCost,
        field: &Field,
        multipliers: &mut Vec<u64>,
        ctx: &ScoringContext<'_>,
    ) -> u64 {
        let complexity = entry.complexity.unwrap_or(self.options.default_complexity);
        if !entry.use_multipliers {
            return complexity;
        }

        if !entry.multipliers.is_empty() {
            let arguments =
                resolve_field_arguments(field, ctx.variables, ctx.variable_definitions);
            let values = multiplier_values(&entry.multipliers, &arguments);
            if !values.is_empty() {
                let multiplier = values
                    .iter()
                    .fold(0u64, |sum, value| sum.saturating_add(*value));
                tracing::trace!(field = %field.name, ?values, multiplier, "field multiplier");
                multipliers.push(multiplier);
            }
        }

        multipliers
            .iter()
            .fold(complexity, |total, multiplier| total.saturating_mul(*multiplier))
    }

    fn score_fragment_spread(
        &self,
        fragment_spread: &FragmentSpread,
        multipliers: &mut Vec<u64>,
        ctx: &ScoringContext<'_>,
    ) -> Result<u64, QueryCostError> {
        if self.is_skipped(&fragment_spread.directives, ctx) {
            return Ok(0);
        }
        let fragment = fragment_spread
            .fragment_def(ctx.document)
            .ok_or_else(|| {
                QueryCostError::MissingFragment(fragment_spread.fragment_name.to_string())
            })?;
        self.score_selection_set(
            &fragment.selection_set,
            fragment.type_condition(),
            multipliers,
            ctx,
        )
    }

    fn score_inline_fragment(
        &self,
        inline_fragment: &InlineFragment,
        parent_type: &NamedType,
        multipliers: &mut Vec<u64>,
        ctx: &ScoringContext<'_>,
    ) -> Result<u64, QueryCostError> {
        if self.is_skipped(&inline_fragment.directives, ctx) {
            return Ok(0);
        }
        self.score_selection_set(&inline_fragment.selection_set, parent_type, multipliers, ctx)
    }

    fn is_skipped(&self, directives: &DirectiveList, ctx: &ScoringContext<'_>) -> bool {
        self.options.respect_conditional_directives
            && skipped_by_directives(directives, ctx.variables, ctx.variable_definitions)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::Value;
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;

    fn shop_schema() -> Valid<Schema> {
        Schema::parse_and_validate(include_str!("testdata/shop_schema.graphql"), "schema.graphql")
            .unwrap()
    }

    fn shop_cost_map() -> CostMap {
        CostMap::from_yaml_str(include_str!("testdata/shop_cost_map.yaml")).unwrap()
    }

    fn variables(value: Value) -> Object {
        match value {
            Value::Object(object) => object,
            _ => panic!("variables must be a JSON object"),
        }
    }

    fn cost_with(
        cost_map: CostMap,
        options: CalculatorOptions,
        query: &str,
        vars: Value,
    ) -> Result<u64, QueryCostError> {
        let schema = shop_schema();
        let document =
            ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
        QueryCostCalculator::new(Arc::new(cost_map), options).estimated(
            &document,
            &schema,
            &variables(vars),
        )
    }

    fn cost(query: &str) -> u64 {
        cost_with(shop_cost_map(), Default::default(), query, json!({})).unwrap()
    }

    #[test]
    fn connection_with_first() {
        let query = "{ products(first: 10) { edges { node { name } } } }";
        assert_eq!(cost(query), 10);
    }

    #[test]
    fn multiplier_applies_to_nested_fields() {
        let query = "
            {
                products(first: 10) {
                    edges {
                        node {
                            category { name }
                            thumbnail { url }
                        }
                    }
                }
            }
        ";

        // products: 1 * 10, category: 1 * 10, thumbnail: 1 * 10
        assert_eq!(cost(query), 30);
    }

    #[test]
    fn nested_multipliers_compound() {
        let query = "
            {
                categories(first: 5) {
                    edges {
                        node {
                            products(first: 20) {
                                edges { node { name } }
                            }
                        }
                    }
                }
            }
        ";

        // categories: 1 * 5, products in each category: 1 * 5 * 20
        assert_eq!(cost(query), 105);
    }

    #[test]
    fn multiplier_arguments_are_summed() {
        let query = "{ products(first: 10, last: 5) { totalCount } }";
        assert_eq!(cost(query), 15);
    }

    #[test]
    fn field_without_multiplier_arguments_costs_its_complexity() {
        let query = "{ products { totalCount } }";
        assert_eq!(cost(query), 1);
    }

    #[test]
    fn zero_multiplier_zeroes_the_subtree() {
        let query = "{ products(first: 0) { edges { node { category { id } } } } }";
        assert_eq!(cost(query), 0);
    }

    #[test]
    fn schema_default_argument_is_a_multiplier() {
        let query = "
            {
                categories(first: 2) {
                    edges {
                        node {
                            children { edges { node { name } } }
                        }
                    }
                }
            }
        ";

        // categories: 1 * 2, children defaults to first: 10 so 1 * 2 * 10
        assert_eq!(cost(query), 22);
    }

    #[test]
    fn variables_provide_multipliers() {
        let query = "
            query Products($first: Int) {
                products(first: $first) { totalCount }
            }
        ";
        let cost_map = shop_cost_map();
        assert_eq!(
            cost_with(
                cost_map.clone(),
                Default::default(),
                query,
                json!({ "first": 25 })
            )
            .unwrap(),
            25
        );
        assert_eq!(
            cost_with(cost_map, Default::default(), query, json!({})).unwrap(),
            1
        );
    }

    #[test]
    fn variable_default_is_used_when_not_provided() {
        let query = "
            query Products($first: Int = 3) {
                products(first: $first) { totalCount }
            }
        ";
        assert_eq!(cost(query), 3);
    }

    #[test]
    fn list_argument_counts_its_items() {
        let query = r#"
            mutation {
                checkoutLinesAdd(
                    checkoutId: "Q2hlY2tvdXQ6MQ=="
                    lines: [
                        { quantity: 1, variantId: "a" }
                        { quantity: 2, variantId: "b" }
                        { quantity: 1, variantId: "c" }
                    ]
                ) {
                    checkout { id }
                }
            }
        "#;
        assert_eq!(cost(query), 3);
    }

    #[test]
    fn nested_multiplier_path() {
        let cost_map = CostMap::new().with_field(
            "Query",
            "products",
            FieldCost::new(2).with_multipliers(["filter.ids"]),
        );
        let query = r#"{ products(filter: { ids: ["a", "b", "c", "d"] }) { totalCount } }"#;
        assert_eq!(
            cost_with(cost_map, Default::default(), query, json!({})).unwrap(),
            8
        );
    }

    #[test]
    fn fragment_spread_keeps_multipliers_in_scope() {
        let query = "
            query {
                products(first: 10) {
                    edges { node { ...ProductFields } }
                }
            }

            fragment ProductFields on Product {
                category { name }
                thumbnail { url }
            }
        ";
        assert_eq!(cost(query), 30);
    }

    #[test]
    fn repeated_fragment_spreads_are_each_counted() {
        let query = "
            query {
                products(first: 10) {
                    edges {
                        node {
                            ...ProductFields
                            ...ProductFields
                        }
                    }
                }
            }

            fragment ProductFields on Product {
                category { name }
                thumbnail { url }
            }
        ";
        assert_eq!(cost(query), 50);
    }

    #[test]
    fn aliases_are_each_counted() {
        let query = "
            {
                a: products(first: 10) { totalCount }
                b: products(first: 10) { totalCount }
            }
        ";
        assert_eq!(cost(query), 20);
    }

    #[test]
    fn inline_fragments_on_interface() {
        let query = r#"
            {
                node(id: "UHJvZHVjdDox") {
                    id
                    ... on Product { category { name } }
                    ... on Category { products(first: 4) { totalCount } }
                }
            }
        "#;

        // node: 1, Product.category: 1, Category.products: 1 * 4
        assert_eq!(cost(query), 6);
    }

    #[test]
    fn inline_fragment_without_type_condition_keeps_parent_type() {
        let query = r#"
            {
                product(id: "UHJvZHVjdDox") {
                    ... { category { name } }
                }
            }
        "#;
        assert_eq!(cost(query), 2);
    }

    #[test]
    fn use_multipliers_false_ignores_multipliers_in_scope() {
        let cost_map = CostMap::new()
            .with_field(
                "Query",
                "products",
                FieldCost::new(7)
                    .with_multipliers(["first"])
                    .without_multipliers(),
            )
            .with_field("Product", "category", FieldCost::new(1));
        let query = "{ products(first: 10) { edges { node { category { name } } } } }";

        // The ignored multiplier is never pushed, so category is not multiplied either.
        assert_eq!(
            cost_with(cost_map, Default::default(), query, json!({})).unwrap(),
            8
        );
    }

    #[test]
    fn default_complexity_applies_to_entries_without_one() {
        let cost_map = CostMap::new().with_field(
            "Query",
            "products",
            FieldCost::default().with_multipliers(["first"]),
        );
        let options = CalculatorOptions {
            default_complexity: 3,
            ..Default::default()
        };
        let query = "{ products(first: 10) { totalCount } }";
        assert_eq!(cost_with(cost_map, options, query, json!({})).unwrap(), 30);
    }

    #[test]
    fn default_cost_applies_to_unmapped_fields() {
        let options = CalculatorOptions {
            default_cost: 1,
            ..Default::default()
        };
        let query = "{ shop { name } }";
        assert_eq!(
            cost_with(shop_cost_map(), options, query, json!({})).unwrap(),
            2
        );
    }

    #[test]
    fn conditional_directives_are_ignored_by_default() {
        let query = "
            {
                products(first: 10) @skip(if: true) { totalCount }
                me { id }
            }
        ";
        assert_eq!(cost(query), 11);
    }

    #[test]
    fn conditional_directives_can_be_respected() {
        let options = CalculatorOptions {
            respect_conditional_directives: true,
            ..Default::default()
        };
        let query = "
            query Storefront($withOrders: Boolean!) {
                products(first: 10) @skip(if: true) { totalCount }
                me {
                    id
                    orders(first: 5) @include(if: $withOrders) { edges { node { id } } }
                    ... @include(if: false) { wishlist { id } }
                }
            }
        ";
        assert_eq!(
            cost_with(
                shop_cost_map(),
                options,
                query,
                json!({ "withOrders": false })
            )
            .unwrap(),
            1
        );
        assert_eq!(
            cost_with(
                shop_cost_map(),
                options,
                query,
                json!({ "withOrders": true })
            )
            .unwrap(),
            6
        );
    }

    #[test]
    fn every_operation_in_the_document_is_counted() {
        let query = "
            query Products { products(first: 10) { totalCount } }
            query Viewer { me { id } }
        ";
        assert_eq!(cost(query), 11);
    }

    #[test]
    fn single_operation_can_be_selected() {
        let schema = shop_schema();
        let query = "
            query Products { products(first: 10) { totalCount } }
            query Viewer { me { id } }
        ";
        let document =
            ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
        let calculator = QueryCostCalculator::new(Arc::new(shop_cost_map()), Default::default());

        assert_eq!(
            calculator
                .estimated_operation(&document, Some("Viewer"), &schema, &Object::new())
                .unwrap(),
            1
        );
        assert_eq!(
            calculator.estimated_operation(&document, Some("Checkout"), &schema, &Object::new()),
            Err(QueryCostError::OperationNotFound("Checkout".to_string()))
        );
    }

    #[test]
    fn empty_cost_map_costs_nothing() {
        let query = "{ products(first: 10) { edges { node { category { name } } } } }";
        assert_eq!(
            cost_with(CostMap::new(), Default::default(), query, json!({})).unwrap(),
            0
        );
    }

    #[test]
    fn invalid_cost_map_fails_before_scoring() {
        let cost_map = shop_cost_map().with_field("Product", "price", FieldCost::new(1));
        let query = "{ shop { name } }";
        assert_eq!(
            cost_with(cost_map, Default::default(), query, json!({})),
            Err(QueryCostError::CostMapUnknownField {
                type_name: "Product".to_string(),
                field_name: "price".to_string(),
            })
        );
    }

    #[test]
    fn huge_multipliers_saturate() {
        let query = "
            {
                categories(first: 2147483647) {
                    edges {
                        node {
                            children(first: 2147483647) {
                                edges {
                                    node {
                                        products(first: 2147483647) { totalCount }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        ";
        assert_eq!(cost(query), u64::MAX);
    }
}
