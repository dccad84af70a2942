//! Parameter normalization.
//!
//! Caller parameters arrive as loosely typed JSON. They are mapped onto a closed set of
//! bindable values here, before any connection is opened.

use crate::error::{DbResult, QueryError};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::str::FromStr;

/// Sigil every bound name carries.
pub const PARAMETER_SIGIL: char = '@';

static PARAMETER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}_#][\p{L}\p{Nd}_#@$]{0,127}$").expect("parameter name pattern is valid")
});

// `@P1`, `@P2`, ... carry the positional values on the wire.
static POSITIONAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Pp][0-9]+$").expect("positional name pattern is valid"));

/// A value the engine can bind.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Decimal(Decimal),
    /// Only for numbers outside the exact decimal range.
    Float(f64),
    String(String),
}

/// One named, normalized parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    name: String,
    value: BoundValue,
}

impl BoundParameter {
    /// Name including the leading `@`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &BoundValue {
        &self.value
    }
}

/// Normalize a single loose value.
pub fn normalize_value(name: &str, value: &Value) -> DbResult<BoundValue> {
    match value {
        Value::Null => Ok(BoundValue::Null),
        Value::Bool(b) => Ok(BoundValue::Bool(*b)),
        Value::Number(n) => Ok(normalize_number(n)),
        Value::String(s) => Ok(BoundValue::String(s.clone())),
        Value::Array(_) => Err(QueryError::unsupported_parameter(
            name,
            "arrays cannot be bound as a parameter value",
        )),
        Value::Object(_) => Err(QueryError::unsupported_parameter(
            name,
            "objects cannot be bound as a parameter value",
        )),
    }
}

fn normalize_number(n: &Number) -> BoundValue {
    if let Some(i) = n.as_i64() {
        return match i32::try_from(i) {
            Ok(small) => BoundValue::Int32(small),
            Err(_) => BoundValue::Int64(i),
        };
    }

    if let Some(u) = n.as_u64() {
        return BoundValue::Decimal(Decimal::from(u));
    }

    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(BoundValue::Decimal)
        .unwrap_or_else(|_| BoundValue::Float(n.as_f64().unwrap_or(f64::NAN)))
}

/// Add the `@` sigil when missing and check the name is a plain identifier.
pub fn bind_name(name: &str) -> DbResult<String> {
    let bare = name.trim().trim_start_matches(PARAMETER_SIGIL);

    if !PARAMETER_NAME.is_match(bare) {
        return Err(QueryError::unsupported_parameter(
            name,
            "parameter names must be identifiers (letters, digits, '_' or '#')",
        ));
    }

    if POSITIONAL_NAME.is_match(bare) {
        return Err(QueryError::unsupported_parameter(
            name,
            "names of the form P<number> are reserved for positional binding",
        ));
    }

    Ok(format!("{}{}", PARAMETER_SIGIL, bare))
}

/// Normalize a whole parameter map. `None` yields no parameters.
pub fn normalize_parameters(parameters: Option<&Map<String, Value>>) -> DbResult<Vec<BoundParameter>> {
    let Some(parameters) = parameters else {
        return Ok(Vec::new());
    };

    let mut seen = HashSet::with_capacity(parameters.len());
    let mut bound = Vec::with_capacity(parameters.len());

    for (raw_name, raw_value) in parameters {
        let name = bind_name(raw_name)?;
        if !seen.insert(name.to_lowercase()) {
            return Err(QueryError::unsupported_parameter(
                raw_name.as_str(),
                "parameter is supplied more than once",
            ));
        }

        let value = normalize_value(raw_name, raw_value)?;
        bound.push(BoundParameter { name, value });
    }

    Ok(bound)
}
