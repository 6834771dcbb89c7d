//! Answer shapes and the typed values that carry them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The type a query's answer must have.
///
/// Accepts the short names `str`, `int_array` and `str_array` as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    Bool,
    Int,
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int_array")]
    IntList,
    #[serde(alias = "str_array")]
    StringList,
}

impl AnswerShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::IntList => "int_list",
            Self::StringList => "string_list",
        }
    }

    /// Whether answers of this shape are lists.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::IntList | Self::StringList)
    }

    /// Whether entity resolution can rewrite answers of this shape.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::StringList)
    }
}

impl fmt::Display for AnswerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated answer. The variant always matches the query's [`AnswerShape`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Int(i64),
    String(String),
    IntList(Vec<i64>),
    StringList(Vec<String>),
}

impl AnswerValue {
    pub fn shape(&self) -> AnswerShape {
        match self {
            Self::Bool(_) => AnswerShape::Bool,
            Self::Int(_) => AnswerShape::Int,
            Self::String(_) => AnswerShape::String,
            Self::IntList(_) => AnswerShape::IntList,
            Self::StringList(_) => AnswerShape::StringList,
        }
    }

    /// The JSON form the model and the HTTP layer exchange.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::from(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::String(s) => serde_json::Value::from(s.as_str()),
            Self::IntList(items) => serde_json::Value::from(items.clone()),
            Self::StringList(items) => serde_json::Value::from(items.clone()),
        }
    }

    /// Render the value as a graph node name. Empty values have no name.
    ///
    /// Lists are joined with `", "`.
    pub fn node_name(&self) -> Option<String> {
        let name = match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::String(s) => s.trim().to_string(),
            Self::IntList(items) => {
                items.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
            }
            Self::StringList(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        };
        (!name.is_empty()).then_some(name)
    }
}
