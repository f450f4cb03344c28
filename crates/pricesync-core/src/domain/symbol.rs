use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical instrument symbol used as the join key between records and quotes.
///
/// Trimmed and never empty. Case is preserved as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Trims `input`; returns `None` when nothing is left.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or("symbol cannot be empty")
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

/// Extracts a symbol from a raw record field value.
///
/// Resolution order:
/// 1. a string is trimmed;
/// 2. a non-empty array whose first element is an object with a string `text`
///    (a rich-text span) yields that text, trimmed;
/// 3. a number yields its decimal rendering (`700`, `1.5`);
/// 4. anything else yields `None`.
///
/// Total: unknown shapes degrade to `None`.
pub fn extract_symbol(value: &Value) -> Option<Symbol> {
    match value {
        Value::String(text) => Symbol::parse(text),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_object)
            .and_then(|span| span.get("text"))
            .and_then(Value::as_str)
            .and_then(Symbol::parse),
        Value::Number(number) => Symbol::parse(&number.to_string()),
        Value::Null | Value::Bool(_) | Value::Object(_) => None,
    }
}
