//! Record definitions
//!
//! The key/value pair handed to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A key/value pair as exposed to callers
///
/// A fresh `Record` is built for every read, write and delivered watch value;
/// callers never share one with the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// The unique key
    pub name: String,

    /// The value at the time this record was produced
    pub value: String,
}

impl Record {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': '{}'", self.name, self.value)
    }
}
