//! Proposition values and their declared types.

use serde::{Deserialize, Serialize};

/// Declared type of a value or property column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Nominal,
    Number,
    /// A number optionally prefixed by a comparator, e.g. `<5` or `>= 10`.
    InequalityNumber,
    Boolean,
    /// Epoch milliseconds.
    Date,
}

/// Comparator attached to an inequality number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InequalityComparator {
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

impl InequalityComparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            InequalityComparator::LessThan => "<",
            InequalityComparator::LessThanOrEqualTo => "<=",
            InequalityComparator::GreaterThan => ">",
            InequalityComparator::GreaterThanOrEqualTo => ">=",
        }
    }
}

/// A typed value carried by a proposition or a property-value filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Nominal(String),
    Number(f64),
    InequalityNumber {
        comparator: InequalityComparator,
        number: f64,
    },
    Boolean(bool),
    Date(i64),
}

impl Value {
    /// Parse a textual representation according to the declared type.
    ///
    /// Returns `None` when the text cannot represent a value of that type.
    pub fn parse(value_type: ValueType, text: &str) -> Option<Value> {
        let text = text.trim();
        match value_type {
            ValueType::Nominal => Some(Value::Nominal(text.to_string())),
            ValueType::Number => text.parse::<f64>().ok().map(Value::Number),
            ValueType::InequalityNumber => parse_inequality(text),
            ValueType::Boolean => parse_bool(text).map(Value::Boolean),
            ValueType::Date => crate::processor::decode::parse_datetime_millis(text).map(Value::Date),
        }
    }

    /// Text used when the value is matched against a code map.
    pub fn as_code_text(&self) -> String {
        match self {
            Value::Nominal(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::InequalityNumber { comparator, number } => {
                format!("{}{}", comparator.symbol(), format_number(*number))
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(ms) => ms.to_string(),
        }
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        let mut buffer = ryu::Buffer::new();
        buffer.format(n).to_string()
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_inequality(text: &str) -> Option<Value> {
    let (comparator, rest) = if let Some(rest) = text.strip_prefix("<=") {
        (Some(InequalityComparator::LessThanOrEqualTo), rest)
    } else if let Some(rest) = text.strip_prefix(">=") {
        (Some(InequalityComparator::GreaterThanOrEqualTo), rest)
    } else if let Some(rest) = text.strip_prefix('<') {
        (Some(InequalityComparator::LessThan), rest)
    } else if let Some(rest) = text.strip_prefix('>') {
        (Some(InequalityComparator::GreaterThan), rest)
    } else {
        (None, text)
    };

    let number = rest.trim().parse::<f64>().ok()?;
    Some(match comparator {
        Some(comparator) => Value::InequalityNumber { comparator, number },
        None => Value::Number(number),
    })
}
