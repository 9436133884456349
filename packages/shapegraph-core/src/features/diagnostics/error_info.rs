//! Memory-safety violation records
//!
//! An [`ErrorInfo`] is attached to the successor state that exhibits the
//! violation. The invalid chain names the regions, values and edges involved
//! so a witness exporter can point at them.

use crate::features::smg::{HasValueEdge, ObjectId, SmgObject, SmgValueId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    InvalidRead,
    InvalidWrite,
    InvalidFree,
    MemoryLeak,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::InvalidRead => "invalid-read",
            Property::InvalidWrite => "invalid-write",
            Property::InvalidFree => "invalid-free",
            Property::MemoryLeak => "memory-leak",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element of the invalid chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainElement {
    Object { id: ObjectId, label: String },
    Value { id: SmgValueId },
    Edge { object: ObjectId, edge: HasValueEdge },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub property: Property,
    pub description: String,
    pub invalid_chain: Vec<ChainElement>,
}

impl ErrorInfo {
    pub fn new(property: Property, description: impl Into<String>) -> Self {
        Self {
            property,
            description: description.into(),
            invalid_chain: Vec::new(),
        }
    }

    pub fn invalid_read(description: impl Into<String>) -> Self {
        Self::new(Property::InvalidRead, description)
    }

    pub fn invalid_write(description: impl Into<String>) -> Self {
        Self::new(Property::InvalidWrite, description)
    }

    pub fn invalid_free(description: impl Into<String>) -> Self {
        Self::new(Property::InvalidFree, description)
    }

    pub fn memory_leak(description: impl Into<String>) -> Self {
        Self::new(Property::MemoryLeak, description)
    }

    pub fn with_object(mut self, object: &SmgObject) -> Self {
        self.invalid_chain.push(ChainElement::Object {
            id: object.id,
            label: object.label.clone(),
        });
        self
    }

    pub fn with_object_id(mut self, id: ObjectId) -> Self {
        self.invalid_chain.push(ChainElement::Object {
            id,
            label: String::new(),
        });
        self
    }

    pub fn with_value(mut self, id: SmgValueId) -> Self {
        self.invalid_chain.push(ChainElement::Value { id });
        self
    }

    pub fn with_edge(mut self, object: ObjectId, edge: HasValueEdge) -> Self {
        self.invalid_chain.push(ChainElement::Edge { object, edge });
        self
    }

    pub fn is(&self, property: Property) -> bool {
        self.property == property
    }

    /// Witness-export form
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "property": self.property.as_str(),
            "description": self.description,
            "invalid_chain": self.invalid_chain,
        })
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.property, self.description)?;
        if !self.invalid_chain.is_empty() {
            let chain: Vec<String> = self
                .invalid_chain
                .iter()
                .map(|element| match element {
                    ChainElement::Object { id, label } if label.is_empty() => id.to_string(),
                    ChainElement::Object { id, label } => format!("{} ({})", label, id),
                    ChainElement::Value { id } => id.to_string(),
                    ChainElement::Edge { object, edge } => {
                        format!("{}[{}..{}]", object, edge.offset, edge.end())
                    }
                })
                .collect();
            write!(f, " via {}", chain.join(" -> "))?;
        }
        Ok(())
    }
}
