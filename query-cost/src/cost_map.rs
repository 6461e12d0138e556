//! Static cost map: how much each field of each object type costs to resolve.
use std::path::Path;

use apollo_compiler::Schema;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::QueryCostError;

/// Cost settings for a single field.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct FieldCost {
    /// Cost of resolving the field once. Falls back to the calculator's default complexity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u64>,

    /// Argument paths whose values are summed into a list-size multiplier, e.g. `first`,
    /// `last` or `filter.ids`. Nested keys are separated with dots.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub multipliers: Vec<String>,

    /// When false, the field costs exactly its complexity, ignoring any multiplier in scope.
    pub use_multipliers: bool,
}

impl Default for FieldCost {
    fn default() -> Self {
        Self {
            complexity: None,
            multipliers: Vec::new(),
            use_multipliers: true,
        }
    }
}

impl FieldCost {
    pub fn new(complexity: u64) -> Self {
        Self {
            complexity: Some(complexity),
            ..Default::default()
        }
    }

    pub fn with_multipliers<I, S>(mut self, multipliers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.multipliers = multipliers.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_multipliers(mut self) -> Self {
        self.use_multipliers = false;
        self
    }
}

/// Mapping from GraphQL object type name to field name to [`FieldCost`].
///
/// Serialized as a plain nested map:
///
/// ```yaml
/// Query:
///   products:
///     complexity: 1
///     multipliers: [first, last]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct CostMap {
    types: IndexMap<String, IndexMap<String, FieldCost>>,
}

impl CostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the cost of `type_name.field_name`.
    pub fn with_field(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        cost: FieldCost,
    ) -> Self {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), cost);
        self
    }

    pub fn field_cost(&self, type_name: &str, field_name: &str) -> Option<&FieldCost> {
        self.types
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, QueryCostError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source).map_err(|e| QueryCostError::CostMapLoad(e.to_string()))
    }

    pub fn from_json_str(source: &str) -> Result<Self, QueryCostError> {
        serde_json::from_str(source).map_err(|e| QueryCostError::CostMapLoad(e.to_string()))
    }

    /// Reads a cost map from disk. Files with a `.json` extension are parsed as JSON, anything
    /// else as YAML.
    pub fn from_path(path: &Path) -> Result<Self, QueryCostError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            QueryCostError::CostMapLoad(format!("could not read {}: {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let cost_map = if is_json {
            Self::from_json_str(&source)?
        } else {
            Self::from_yaml_str(&source)?
        };
        tracing::debug!(
            path = %path.display(),
            types = cost_map.types.len(),
            "loaded cost map"
        );
        Ok(cost_map)
    }

    /// Checks that every type in the map is an object type of `schema` and that every field
    /// exists on it. Stops at the first mismatch.
    pub fn validate(&self, schema: &Schema) -> Result<(), QueryCostError> {
        for (type_name, fields) in &self.types {
            let Some(ty) = schema.types.get(type_name.as_str()) else {
                return Err(QueryCostError::CostMapUnknownType {
                    type_name: type_name.clone(),
                });
            };
            let ExtendedType::Object(object) = ty else {
                return Err(QueryCostError::CostMapNotObjectType {
                    type_name: type_name.clone(),
                });
            };
            if let Some(field_name) = fields
                .keys()
                .find(|field_name| !object.fields.contains_key(field_name.as_str()))
            {
                return Err(QueryCostError::CostMapUnknownField {
                    type_name: type_name.clone(),
                    field_name: field_name.clone(),
                });
            }
        }
        Ok(())
    }
}
