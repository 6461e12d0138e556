//! Rejecting operations that cost more than allowed.
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;

use crate::Object;
use crate::calculator::QueryCostCalculator;
use crate::error::QueryCostError;

/// Upper bound on the estimated cost of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostLimit {
    pub maximum: u64,
}

impl CostLimit {
    pub fn new(maximum: u64) -> Self {
        Self { maximum }
    }

    /// Compares `cost` with the limit. Costs equal to the maximum are accepted.
    pub fn check(&self, cost: u64) -> Result<CostReport, QueryCostError> {
        if cost > self.maximum {
            tracing::warn!(
                cost,
                max_cost = self.maximum,
                "operation rejected: estimated cost exceeds the maximum"
            );
            return Err(QueryCostError::CostTooExpensive {
                cost,
                max_cost: self.maximum,
            });
        }
        Ok(CostReport {
            requested_query_cost: cost,
            maximum_available: Some(self.maximum),
        })
    }
}

/// Cost information reported to clients in the `cost` response extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    pub requested_query_cost: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_available: Option<u64>,
}

impl CostReport {
    /// `{"cost": {"requestedQueryCost": .., "maximumAvailable": ..}}`
    pub fn to_extensions(&self) -> Object {
        let mut extensions = Object::new();
        extensions.insert(
            ByteString::from("cost"),
            serde_json_bytes::to_value(self).unwrap_or_default(),
        );
        extensions
    }
}

/// Estimates the cost of `document` and checks it against `limit`, when one is set.
pub fn validate_query_cost(
    schema: &Valid<Schema>,
    document: &Valid<ExecutableDocument>,
    operation_name: Option<&str>,
    variables: &Object,
    calculator: &QueryCostCalculator,
    limit: Option<CostLimit>,
) -> Result<CostReport, QueryCostError> {
    let cost = match operation_name {
        Some(_) => calculator.estimated_operation(document, operation_name, schema, variables)?,
        None => calculator.estimated(document, schema, variables)?,
    };
    match limit {
        Some(limit) => limit.check(cost),
        None => Ok(CostReport {
            requested_query_cost: cost,
            maximum_available: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json_bytes::Value;
    use serde_json_bytes::json;

    use super::*;
    use crate::cost_map::CostMap;

    const QUERY: &str = "{ products(first: 100) { edges { node { category { name } } } } }";

    fn validate(limit: Option<CostLimit>) -> Result<CostReport, QueryCostError> {
        let schema = Schema::parse_and_validate(
            include_str!("testdata/shop_schema.graphql"),
            "schema.graphql",
        )
        .unwrap();
        let document =
            ExecutableDocument::parse_and_validate(&schema, QUERY, "query.graphql").unwrap();
        let cost_map =
            CostMap::from_yaml_str(include_str!("testdata/shop_cost_map.yaml")).unwrap();
        let calculator = QueryCostCalculator::new(Arc::new(cost_map), Default::default());
        validate_query_cost(
            &schema,
            &document,
            None,
            &Object::new(),
            &calculator,
            limit,
        )
    }

    #[test]
    fn cost_within_limit() {
        assert_eq!(
            validate(Some(CostLimit::new(200))),
            Ok(CostReport {
                requested_query_cost: 200,
                maximum_available: Some(200),
            })
        );
    }

    #[test]
    fn cost_over_limit() {
        assert_eq!(
            validate(Some(CostLimit::new(199))),
            Err(QueryCostError::CostTooExpensive {
                cost: 200,
                max_cost: 199,
            })
        );
    }

    #[test]
    fn no_limit_only_reports() {
        let report = validate(None).unwrap();
        assert_eq!(
            Value::Object(report.to_extensions()),
            json!({ "cost": { "requestedQueryCost": 200 } })
        );
    }
}
