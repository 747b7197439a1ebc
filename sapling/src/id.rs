use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix used to tag tree item identifiers embedded in host element ids.
pub const ELEMENT_ID_PREFIX: &str = "tree-item-";

/// Identifier of a tree item.
///
/// Identifiers are either numbers or strings. A *blank* identifier (`0` or
/// the empty string) never resolves to an item; used as a parent id it marks
/// the item as a root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Num(i64),
    Text(String),
}

impl ItemId {
    /// Return whether the identifier is blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Num(value) => *value == 0,
            Self::Text(value) => value.is_empty(),
        }
    }

    /// Drop blank identifiers.
    pub fn non_blank(self) -> Option<Self> {
        if self.is_blank() { None } else { Some(self) }
    }

    /// Parse raw text, turning numeric text into a numeric identifier.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(value) => Self::Num(value),
            Err(_) => Self::Text(raw.to_owned()),
        }
    }

    /// Element id used by hosts to tag the rendered row of this item.
    pub fn element_id(&self) -> String {
        format!("{ELEMENT_ID_PREFIX}{self}")
    }

    /// Recover an item identifier from a host element id.
    ///
    /// The [`ELEMENT_ID_PREFIX`] is stripped when present. Returns `None` when
    /// nothing but a blank identifier remains.
    pub fn from_element_id(raw: &str) -> Option<Self> {
        let stripped = raw.strip_prefix(ELEMENT_ID_PREFIX).unwrap_or(raw);
        Self::parse(stripped).non_blank()
    }

    /// Read an identifier out of a JSON value.
    ///
    /// Integers and strings are accepted; `null`, booleans and containers are
    /// treated as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(match number.as_i64() {
                Some(value) => Self::Num(value),
                None => Self::Text(number.to_string()),
            }),
            Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    /// Convert the identifier into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Num(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
