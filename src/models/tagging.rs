//! Object tags (key/value pairs stored alongside an object).

use serde::{Deserialize, Serialize};

/// A single object tag. Keys are unique within an object's tag set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
