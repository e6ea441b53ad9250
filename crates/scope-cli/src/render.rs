//! Plain renderings of configuration trees

use scope_model::{ComplexNode, Element, Property};
use serde_json::{Map, Value};

/// The node's values as JSON: simple values as strings or null, complex
/// nodes and maps as objects, lists and sets as arrays.
pub fn to_json(node: &ComplexNode) -> Value {
    Value::Object(
        node.properties
            .iter()
            .map(|(name, property)| (name.clone(), property_to_json(property)))
            .collect(),
    )
}

pub fn property_to_json(property: &Property) -> Value {
    match property {
        Property::Simple(simple) => simple
            .value()
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        Property::Complex(node) => to_json(node),
        Property::List(collection) | Property::Set(collection) => {
            Value::Array(collection.items.iter().map(element_to_json).collect())
        }
        Property::Map(map) => Value::Object(
            map.entries
                .iter()
                .map(|(key, element)| (key.clone(), element_to_json(element)))
                .collect::<Map<_, _>>(),
        ),
    }
}

fn element_to_json(element: &Element) -> Value {
    match element {
        Element::Simple { value } => value
            .as_deref()
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        Element::Complex(node) => to_json(node),
    }
}

/// `(dotted path, rendered value)` for every non-complex property, with
/// complex properties expanded in place.
pub fn flatten(node: &ComplexNode) -> Vec<(String, String)> {
    let mut lines = Vec::new();
    flatten_into(node, "", &mut lines);
    lines
}

fn flatten_into(node: &ComplexNode, prefix: &str, out: &mut Vec<(String, String)>) {
    for (name, property) in &node.properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match property {
            Property::Complex(child) if !child.is_empty() => flatten_into(child, &path, out),
            other => out.push((path, other.describe())),
        }
    }
}
