//! Query cost errors.
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;
use thiserror::Error;

use crate::Object;
use crate::limits::CostReport;

/// Errors raised while loading a cost map or estimating the cost of an operation.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryCostError {
    /// The query cost could not be calculated because cost map specifies a type {type_name} that is not defined by the schema.
    CostMapUnknownType { type_name: String },

    /// The query cost could not be calculated because cost map specifies a type {type_name} that is defined by the schema, but is not an object type.
    CostMapNotObjectType { type_name: String },

    /// The query cost could not be calculated because cost map specifies a field {field_name} of type {type_name} that is not defined by the schema.
    CostMapUnknownField {
        type_name: String,
        field_name: String,
    },

    /// could not load the cost map: {0}
    CostMapLoad(String),

    /// Query cost could not be calculated because the operation type {operation_type} is not supported.
    UnsupportedOperation { operation_type: String },

    /// Parsed operation did not have a definition for fragment {0}
    MissingFragment(String),

    /// operation {0} was not found in the document
    OperationNotFound(String),

    /// The query exceeds the maximum cost of {max_cost}. Actual cost is {cost}
    CostTooExpensive { cost: u64, max_cost: u64 },

    /// invalid schema: {0}
    InvalidSchema(String),

    /// invalid operation: {0}
    InvalidOperation(String),
}

impl QueryCostError {
    /// Stable error code, reported in the `extensions.code` field of GraphQL errors.
    pub fn code(&self) -> &'static str {
        match self {
            QueryCostError::CostMapUnknownType { .. }
            | QueryCostError::CostMapNotObjectType { .. }
            | QueryCostError::CostMapUnknownField { .. }
            | QueryCostError::CostMapLoad(_) => "COST_MAP_INVALID",
            QueryCostError::UnsupportedOperation { .. } => "OPERATION_NOT_SUPPORTED",
            QueryCostError::MissingFragment(_) | QueryCostError::InvalidOperation(_) => {
                "GRAPHQL_VALIDATION_FAILED"
            }
            QueryCostError::OperationNotFound(_) => "OPERATION_NOT_FOUND",
            QueryCostError::CostTooExpensive { .. } => "QUERY_COST_EXCEEDED",
            QueryCostError::InvalidSchema(_) => "INVALID_SCHEMA",
        }
    }

    /// Convert the error to a GraphQL error.
    ///
    /// Errors raised by the limit check also carry the cost report, so that clients can see
    /// how far over budget the operation was.
    pub fn to_graphql_error(&self) -> GraphQLError {
        let mut extensions = Object::new();
        extensions.insert(
            ByteString::from("code"),
            Value::String(ByteString::from(self.code())),
        );
        if let QueryCostError::CostTooExpensive { cost, max_cost } = self {
            let report = CostReport {
                requested_query_cost: *cost,
                maximum_available: Some(*max_cost),
            };
            for (key, value) in report.to_extensions() {
                extensions.insert(key, value);
            }
        }
        GraphQLError {
            message: self.to_string(),
            extensions,
        }
    }
}

impl From<WithErrors<apollo_compiler::Schema>> for QueryCostError {
    fn from(value: WithErrors<apollo_compiler::Schema>) -> Self {
        QueryCostError::InvalidSchema(value.errors.to_string())
    }
}

impl From<WithErrors<apollo_compiler::ExecutableDocument>> for QueryCostError {
    fn from(value: WithErrors<apollo_compiler::ExecutableDocument>) -> Self {
        QueryCostError::InvalidOperation(value.errors.to_string())
    }
}

impl From<DiagnosticList> for QueryCostError {
    fn from(value: DiagnosticList) -> Self {
        QueryCostError::InvalidOperation(value.to_string())
    }
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors), as it appears in the
/// `errors` field of a response rejected before execution.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    /// The error message.
    pub message: String,

    /// The optional GraphQL extensions for this error.
    #[serde(default, skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}
