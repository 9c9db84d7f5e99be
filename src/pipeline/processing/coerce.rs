use crate::constants::{NULL_SENTINELS, PET_TYPES};
use crate::types::Value;
use once_cell::sync::Lazy;
use regex::Regex;

/// Currency symbol and thousands separator, stripped before numeric parsing
static CURRENCY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$,]").expect("currency pattern is valid"));

/// Outcome of coercing one cell to a number. Both non-number outcomes end up
/// as `Value::Missing`; they are kept apart so parse failures can be counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Number(f64),
    /// Empty cell, null sentinel or NaN
    Null,
    /// Text that is not a number even after stripping `$` and `,`
    Unparseable,
}

/// Outcome of mapping a yes/no style categorical cell to a boolean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flag {
    Known(bool),
    Null,
    /// Outside the column's vocabulary
    Unrecognized,
}

impl Flag {
    pub fn into_value(self) -> Value {
        match self {
            Flag::Known(b) => Value::Boolean(b),
            Flag::Null | Flag::Unrecognized => Value::Missing,
        }
    }
}

pub fn is_null_sentinel(text: &str) -> bool {
    NULL_SENTINELS.contains(&text)
}

pub fn coerce_numeric(value: &Value) -> Coerced {
    match value {
        Value::Integer(i) => Coerced::Number(*i as f64),
        Value::Real(f) if f.is_finite() => Coerced::Number(*f),
        Value::Real(_) | Value::Missing => Coerced::Null,
        Value::Text(s) => parse_numeric_text(s).map_or(Coerced::Unparseable, Coerced::Number),
        Value::Boolean(_) | Value::Timestamp(_) => Coerced::Unparseable,
    }
}

/// "$1,200.50" -> 1200.5. Non-finite results are rejected.
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    let stripped = CURRENCY_CHARS.replace_all(text, "");
    stripped
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
}

fn yes_no(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if text.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

/// `has_photo`: "Thumbnail" counts as a photo, then yes/no.
pub fn photo_flag(value: &Value) -> Flag {
    match value {
        Value::Boolean(b) => Flag::Known(*b),
        Value::Missing => Flag::Null,
        Value::Text(s) if s == "Thumbnail" => Flag::Known(true),
        Value::Text(s) => yes_no(s).map_or(Flag::Unrecognized, Flag::Known),
        _ => Flag::Unrecognized,
    }
}

/// `pets_allowed`: null sentinels mean no pets, any listing of pet types means yes.
pub fn pets_flag(value: &Value) -> Flag {
    match value {
        Value::Boolean(b) => Flag::Known(*b),
        Value::Missing => Flag::Null,
        Value::Text(s) if is_null_sentinel(s) => Flag::Known(false),
        Value::Text(s) if is_pet_listing(s) => Flag::Known(true),
        Value::Text(s) => yes_no(s).map_or(Flag::Unrecognized, Flag::Known),
        _ => Flag::Unrecognized,
    }
}

/// "Cats", "Dogs", "Cats,Dogs", ...
fn is_pet_listing(text: &str) -> bool {
    let mut tokens = text.split(',').map(str::trim).peekable();
    tokens.peek().is_some()
        && tokens.all(|t| PET_TYPES.iter().any(|p| p.eq_ignore_ascii_case(t)))
}
