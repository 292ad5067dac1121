//! Tagged tool input schemas.
//!
//! Tools describe their arguments with a [`Schema`] value rather than raw
//! JSON. It is rendered to a JSON-schema object only when the tool catalog
//! is sent to the completion service or printed.

use serde_json::{Map, Value, json};

/// A JSON-schema-like description of a tool's arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Object {
        description: Option<String>,
        properties: Vec<(String, Schema)>,
        required: Vec<String>,
    },
    Array {
        description: Option<String>,
        items: Box<Schema>,
    },
    String {
        description: Option<String>,
    },
    Integer {
        description: Option<String>,
    },
    Boolean {
        description: Option<String>,
    },
}

impl Schema {
    /// An empty object schema; add fields with [`Schema::property`].
    pub fn object() -> Self {
        Schema::Object {
            description: None,
            properties: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn string(description: &str) -> Self {
        Schema::String { description: Some(description.to_string()) }
    }

    pub fn integer(description: &str) -> Self {
        Schema::Integer { description: Some(description.to_string()) }
    }

    pub fn boolean(description: &str) -> Self {
        Schema::Boolean { description: Some(description.to_string()) }
    }

    pub fn array(description: &str, items: Schema) -> Self {
        Schema::Array {
            description: Some(description.to_string()),
            items: Box::new(items),
        }
    }

    /// Add an optional property. No-op on non-object schemas.
    pub fn property(mut self, name: &str, schema: Schema) -> Self {
        if let Schema::Object { properties, .. } = &mut self {
            properties.push((name.to_string(), schema));
        }
        self
    }

    /// Add a property and mark it required.
    pub fn required(mut self, name: &str, schema: Schema) -> Self {
        if let Schema::Object { properties, required, .. } = &mut self {
            properties.push((name.to_string(), schema));
            required.push(name.to_string());
        }
        self
    }

    fn description(&self) -> Option<&str> {
        match self {
            Schema::Object { description, .. }
            | Schema::Array { description, .. }
            | Schema::String { description }
            | Schema::Integer { description }
            | Schema::Boolean { description } => description.as_deref(),
        }
    }

    /// Render to the JSON-schema wire form.
    pub fn to_json(&self) -> Value {
        let mut out = match self {
            Schema::Object { properties, required, .. } => {
                let mut props = Map::new();
                for (name, schema) in properties {
                    props.insert(name.clone(), schema.to_json());
                }
                let mut obj = json!({ "type": "object", "properties": props });
                if !required.is_empty() {
                    obj["required"] = json!(required);
                }
                obj
            }
            Schema::Array { items, .. } => json!({ "type": "array", "items": items.to_json() }),
            Schema::String { .. } => json!({ "type": "string" }),
            Schema::Integer { .. } => json!({ "type": "integer" }),
            Schema::Boolean { .. } => json!({ "type": "boolean" }),
        };
        if let Some(desc) = self.description() {
            out["description"] = json!(desc);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_renders_required_and_nested_items() {
        let schema = Schema::object()
            .required("command", Schema::string("Executable name"))
            .property("args", Schema::array("Arguments", Schema::string("Argument")));

        let v = schema.to_json();
        assert_eq!(v["type"], "object");
        assert_eq!(v["required"], json!(["command"]));
        assert_eq!(v["properties"]["command"]["type"], "string");
        assert_eq!(v["properties"]["args"]["items"]["type"], "string");
    }

    #[test]
    fn object_without_required_omits_key() {
        let v = Schema::object().property("max", Schema::integer("Limit")).to_json();
        assert!(v.get("required").is_none());
        assert_eq!(v["properties"]["max"]["description"], "Limit");
    }
}
