//! Static cost estimation for GraphQL operations.
//!
//! A [`CostMap`] assigns a complexity to fields of object types, and names the arguments
//! (`first`, `last`, ...) whose values multiply the cost of everything selected below the
//! field. [`QueryCostCalculator`] walks an executable document against that map before
//! execution, and [`validate_query_cost`] rejects operations that cost more than a configured
//! maximum.
//!
//! ```yaml
//! Query:
//!   products:
//!     complexity: 1
//!     multipliers: [first, last]
//! Product:
//!   category:
//!     complexity: 1
//! ```
//!
//! With this map `{ products(first: 10) { edges { node { category { name } } } } }` costs 20:
//! 10 for the products connection and 10 for the category of each product.

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod arguments;
pub mod calculator;
pub mod configuration;
pub mod cost_map;
mod directives;
pub mod error;
pub mod limits;

pub use crate::calculator::CalculatorOptions;
pub use crate::calculator::QueryCostCalculator;
pub use crate::configuration::Configuration;
pub use crate::configuration::ConfigurationError;
pub use crate::cost_map::CostMap;
pub use crate::cost_map::FieldCost;
pub use crate::error::GraphQLError;
pub use crate::error::QueryCostError;
pub use crate::limits::CostLimit;
pub use crate::limits::CostReport;
pub use crate::limits::validate_query_cost;

/// A JSON object, as used for request variables, resolved arguments and response extensions.
pub type Object = serde_json_bytes::Map<serde_json_bytes::ByteString, serde_json_bytes::Value>;

const _: () = {
    const fn assert_thread_safe<T: Sync + Send>() {}

    assert_thread_safe::<QueryCostCalculator>();
    assert_thread_safe::<CostMap>();
};
