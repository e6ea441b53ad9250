//! Conversion between typed values and configuration trees
//!
//! Values go through `serde_json::Value` and are laid out according to the
//! registered schemas: the schema, not the value, decides which properties
//! exist and what kind each one is. Simple values are stored as strings and
//! decoded back by their declared type name:
//!
//! | type names | JSON value |
//! |------------|------------|
//! | `bool` | boolean |
//! | `i8`..`i64`, `u8`..`u64`, `isize`, `usize`, `int`, `integer` | integer |
//! | `f32`, `f64`, `float`, `number` | float |
//! | `json` | parsed JSON document |
//! | anything else | string |

use crate::{Error, Result};
use scope_model::{
    Collection, ComplexNode, Element, MapNode, Property, PropertyKind, SchemaRegistry, TypeSchema,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

/// Schema-guided encoder and decoder.
#[derive(Debug, Clone, Copy)]
pub struct TreeCodec<'a> {
    schemas: &'a SchemaRegistry,
}

impl<'a> TreeCodec<'a> {
    pub fn new(schemas: &'a SchemaRegistry) -> Self {
        Self { schemas }
    }

    /// Encode `value` as a complex node of `type_name`.
    pub fn encode<T: Serialize>(&self, value: &T, type_name: &str) -> Result<ComplexNode> {
        let json = serde_json::to_value(value).map_err(|e| Error::binding(type_name, e.to_string()))?;
        match json {
            Value::Object(map) => self.encode_object(&map, self.schema(type_name)?),
            other => Err(Error::binding(
                type_name,
                format!("expected an object, got {other}"),
            )),
        }
    }

    /// Decode `node` into `T`. Properties missing from the node keep the
    /// values of `T::default()`.
    pub fn decode<T>(&self, node: &ComplexNode) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let type_name = node.property_type();
        let decoded = self.decode_object(node)?;
        let mut json = serde_json::to_value(T::default())
            .map_err(|e| Error::binding(type_name, e.to_string()))?;
        overlay(&mut json, Value::Object(decoded));
        serde_json::from_value(json).map_err(|e| Error::binding(type_name, e.to_string()))
    }

    fn schema(&self, type_name: &str) -> Result<&'a TypeSchema> {
        self.schemas
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    fn encode_object(&self, map: &Map<String, Value>, schema: &TypeSchema) -> Result<ComplexNode> {
        let mut node = ComplexNode::new(schema.name());
        for property in schema.properties() {
            let Some(value) = map.get(&property.name) else {
                continue;
            };
            let name = property.name.as_str();
            let encoded = match (property.kind, value) {
                (PropertyKind::Simple, _) => {
                    Property::simple(property.type_name.as_str(), scalar_to_string(value))
                }
                (_, Value::Null) => continue,
                (PropertyKind::Complex, Value::Object(fields)) => Property::complex(
                    self.encode_object(fields, self.schema(&property.type_name)?)?,
                ),
                (PropertyKind::List | PropertyKind::Set, Value::Array(items)) => {
                    let mut collection = Collection::new(property.type_name.as_str());
                    for item in items {
                        let element = self.encode_element(item, &property.type_name)?;
                        if property.kind == PropertyKind::Set {
                            collection.insert_unique(element);
                        } else {
                            collection.push(element);
                        }
                    }
                    if property.kind == PropertyKind::Set {
                        Property::set(collection)
                    } else {
                        Property::list(collection)
                    }
                }
                (PropertyKind::Map, Value::Object(entries)) => {
                    let mut map_node = MapNode::new(property.type_name.as_str());
                    for (key, entry) in entries {
                        map_node.insert(key.clone(), self.encode_element(entry, &property.type_name)?);
                    }
                    Property::map(map_node)
                }
                (kind, other) => {
                    return Err(Error::binding(
                        schema.name(),
                        format!("property '{name}' is declared {kind} but holds {other}"),
                    ));
                }
            };
            node.insert(name, encoded);
        }
        Ok(node)
    }

    fn encode_element(&self, value: &Value, element_type: &str) -> Result<Element> {
        let Some(schema) = self.schemas.get(element_type) else {
            return Ok(Element::Simple {
                value: scalar_to_string(value),
            });
        };
        match value {
            Value::Null => Ok(Element::null()),
            Value::Object(fields) => Ok(Element::complex(self.encode_object(fields, schema)?)),
            other => Err(Error::binding(
                element_type,
                format!("expected an object element, got {other}"),
            )),
        }
    }

    fn decode_object(&self, node: &ComplexNode) -> Result<Map<String, Value>> {
        let schema = self.schema(node.property_type())?;
        let mut map = Map::new();
        for property in schema.properties() {
            let Some(stored) = node.get(&property.name) else {
                continue;
            };
            let value = match stored {
                Property::Simple(simple) => {
                    decode_scalar(simple.value(), &property.type_name, schema.name(), &property.name)?
                }
                Property::Complex(child) => Value::Object(self.decode_object(child)?),
                Property::List(collection) | Property::Set(collection) => Value::Array(
                    collection
                        .items
                        .iter()
                        .map(|e| self.decode_element(e, &property.type_name, &property.name))
                        .collect::<Result<_>>()?,
                ),
                Property::Map(map_node) => Value::Object(
                    map_node
                        .entries
                        .iter()
                        .map(|(k, e)| {
                            Ok((k.clone(), self.decode_element(e, &property.type_name, &property.name)?))
                        })
                        .collect::<Result<_>>()?,
                ),
            };
            map.insert(property.name.clone(), value);
        }
        Ok(map)
    }

    fn decode_element(&self, element: &Element, element_type: &str, property: &str) -> Result<Value> {
        match element {
            Element::Simple { value } => {
                decode_scalar(value.as_deref(), element_type, element_type, property)
            }
            Element::Complex(node) => Ok(Value::Object(self.decode_object(node)?)),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode_scalar(
    value: Option<&str>,
    type_name: &str,
    owner: &str,
    property: &str,
) -> Result<Value> {
    let Some(raw) = value else {
        return Ok(Value::Null);
    };
    let invalid = || {
        Error::binding(
            owner,
            format!("property '{property}' holds {raw:?}, not a valid {type_name}"),
        )
    };
    let decoded = match type_name {
        "bool" => Value::Bool(raw.parse().map_err(|_| invalid())?),
        "i8" | "i16" | "i32" | "i64" | "isize" | "int" | "integer" => {
            Value::Number(raw.parse::<i64>().map_err(|_| invalid())?.into())
        }
        "u8" | "u16" | "u32" | "u64" | "usize" => {
            Value::Number(raw.parse::<u64>().map_err(|_| invalid())?.into())
        }
        "f32" | "f64" | "float" | "number" => {
            let float = raw.parse::<f64>().map_err(|_| invalid())?;
            Value::Number(Number::from_f64(float).ok_or_else(invalid)?)
        }
        "json" => serde_json::from_str(raw).map_err(|_| invalid())?,
        _ => Value::String(raw.to_string()),
    };
    Ok(decoded)
}

/// Deep-merge `top` into `base`; objects merge key by key, anything else replaces.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base_map), Value::Object(top_map)) => {
            for (key, value) in top_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        overlay(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Server {
        host: String,
        port: u16,
    }

    impl Default for Server {
        fn default() -> Self {
            Self {
                host: "localhost".to_string(),
                port: 80,
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct App {
        name: String,
        debug: bool,
        ratio: f64,
        nickname: Option<String>,
        primary: Server,
        tags: Vec<String>,
        replicas: Vec<Server>,
        limits: BTreeMap<String, u32>,
    }

    fn schemas() -> SchemaRegistry {
        let mut schemas = SchemaRegistry::new();
        schemas.register(
            TypeSchema::builder("App")
                .simple("name", "string")
                .simple("debug", "bool")
                .simple("ratio", "f64")
                .simple("nickname", "string")
                .complex("primary", "Server")
                .list("tags", "string")
                .list("replicas", "Server")
                .map("limits", "u32")
                .build()
                .unwrap(),
        );
        schemas.register(
            TypeSchema::builder("Server")
                .simple("host", "string")
                .simple("port", "u16")
                .build()
                .unwrap(),
        );
        schemas
    }

    fn sample() -> App {
        App {
            name: "demo".to_string(),
            debug: true,
            ratio: 0.5,
            nickname: None,
            primary: Server {
                host: "a".to_string(),
                port: 1,
            },
            tags: vec!["x".to_string(), "y".to_string()],
            replicas: vec![Server::default()],
            limits: BTreeMap::from([("cpu".to_string(), 4)]),
        }
    }

    #[test]
    fn encode_lays_out_properties_by_schema() {
        let schemas = schemas();
        let node = TreeCodec::new(&schemas).encode(&sample(), "App").unwrap();

        assert_eq!(node.value("debug"), Some("true"));
        assert_eq!(node.value("ratio"), Some("0.5"));
        assert!(node.simple("nickname").unwrap().value().is_none());
        assert_eq!(node.complex("primary").unwrap().value("port"), Some("1"));
        assert_eq!(node.get("tags").unwrap().kind(), PropertyKind::List);
        let replicas = node.get("replicas").unwrap().as_collection().unwrap();
        assert_eq!(replicas.items[0].as_complex().unwrap().value("host"), Some("localhost"));
        assert_eq!(node.get("limits").unwrap().as_map().unwrap().get("cpu").unwrap().as_str(), Some("4"));
    }

    #[test]
    fn decode_restores_the_value() {
        let schemas = schemas();
        let codec = TreeCodec::new(&schemas);
        let node = codec.encode(&sample(), "App").unwrap();
        assert_eq!(codec.decode::<App>(&node).unwrap(), sample());
    }

    #[test]
    fn missing_properties_take_defaults() {
        let schemas = schemas();
        let node = ComplexNode::builder("App")
            .simple("name", "string", "partial")
            .complex("primary", ComplexNode::builder("Server").simple("port", "u16", "8080").build())
            .build();

        let app: App = TreeCodec::new(&schemas).decode(&node).unwrap();
        assert_eq!(app.name, "partial");
        assert_eq!(app.primary.host, "localhost");
        assert_eq!(app.primary.port, 8080);
        assert!(app.tags.is_empty());
    }

    #[test]
    fn invalid_scalar_is_a_binding_error() {
        let schemas = schemas();
        let node = ComplexNode::builder("App")
            .simple("debug", "bool", "perhaps")
            .build();
        let err = TreeCodec::new(&schemas).decode::<App>(&node).unwrap_err();
        assert!(matches!(err, Error::Binding { .. }));
    }

    #[test]
    fn unknown_type_is_reported() {
        let schemas = SchemaRegistry::new();
        let err = TreeCodec::new(&schemas).encode(&sample(), "App").unwrap_err();
        assert!(matches!(err, Error::UnknownType(ref t) if t == "App"));
    }
}
