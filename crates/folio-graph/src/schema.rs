//! The type schema: a registry of entry types and their constraints.
//!
//! Entry payloads are tagged by type name and resolved through this
//! registry; there is no structural probing of payloads. A type may declare
//! a `contains` list restricting which child types it accepts, enforced by
//! create and move operations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GraphError, GraphResult};

/// Decode/encode hook for one entry type's payload.
///
/// The default implementation passes the payload through unchanged; a
/// schema may install a codec per type to validate or normalize payloads at
/// the mutation boundary.
pub trait PayloadCodec: Send + Sync {
    /// Validate and normalize an incoming payload.
    fn decode(&self, data: serde_json::Value) -> GraphResult<serde_json::Value> {
        Ok(data)
    }

    /// Produce the stored form of a payload.
    fn encode(&self, data: serde_json::Value) -> GraphResult<serde_json::Value> {
        Ok(data)
    }
}

/// The passthrough codec used when a type installs none.
struct Passthrough;

impl PayloadCodec for Passthrough {}

/// Definition of one entry type.
#[derive(Clone)]
pub struct TypeDef {
    /// Child types this type accepts. `None` allows any type.
    pub contains: Option<Vec<String>>,
    codec: Arc<dyn PayloadCodec>,
}

impl TypeDef {
    /// A type accepting any child type, with a passthrough codec.
    pub fn new() -> Self {
        Self {
            contains: None,
            codec: Arc::new(Passthrough),
        }
    }

    /// Restrict the child types this type accepts.
    pub fn contains<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contains = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Install a payload codec for this type.
    pub fn codec(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Whether this type accepts a child of the given type.
    pub fn allows_child(&self, child_type: &str) -> bool {
        match &self.contains {
            Some(types) => types.iter().any(|t| t == child_type),
            None => true,
        }
    }
}

impl Default for TypeDef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef")
            .field("contains", &self.contains)
            .finish()
    }
}

/// Registry mapping type name to its definition.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    types: HashMap<String, TypeDef>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous definition of the name.
    pub fn define(mut self, name: impl Into<String>, def: TypeDef) -> Self {
        self.types.insert(name.into(), def);
        self
    }

    /// Look up a type by name.
    pub fn get(&self, name: &str) -> GraphResult<&TypeDef> {
        self.types
            .get(name)
            .ok_or_else(|| GraphError::UnknownType(name.to_string()))
    }

    /// Decode a payload through the named type's codec.
    pub fn decode(&self, type_name: &str, data: serde_json::Value) -> GraphResult<serde_json::Value> {
        self.get(type_name)?.codec.decode(data)
    }

    /// Encode a payload through the named type's codec.
    pub fn encode(&self, type_name: &str, data: serde_json::Value) -> GraphResult<serde_json::Value> {
        self.get(type_name)?.codec.encode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_errors() {
        let schema = Schema::new();
        assert!(matches!(
            schema.get("Page"),
            Err(GraphError::UnknownType(_))
        ));
    }

    #[test]
    fn contains_restricts_child_types() {
        let schema = Schema::new()
            .define("Folder", TypeDef::new().contains(["Page"]))
            .define("Page", TypeDef::new());
        let folder = schema.get("Folder").unwrap();
        assert!(folder.allows_child("Page"));
        assert!(!folder.allows_child("Folder"));
        // No declared list allows anything.
        assert!(schema.get("Page").unwrap().allows_child("Folder"));
    }

    #[test]
    fn codec_hooks_run_per_type() {
        struct TitleRequired;
        impl PayloadCodec for TitleRequired {
            fn decode(&self, data: serde_json::Value) -> GraphResult<serde_json::Value> {
                if data.get("title").and_then(|t| t.as_str()).is_none() {
                    return Err(GraphError::InvalidPayload("missing title".to_string()));
                }
                Ok(data)
            }
        }
        let schema = Schema::new().define("Page", TypeDef::new().codec(TitleRequired));
        assert!(schema
            .decode("Page", serde_json::json!({"title": "Home"}))
            .is_ok());
        assert!(matches!(
            schema.decode("Page", serde_json::json!({})),
            Err(GraphError::InvalidPayload(_))
        ));
    }
}
