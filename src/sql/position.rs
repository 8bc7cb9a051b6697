//! Rendering of positions (epoch milliseconds) inside SQL.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, SqlDialect};

/// How positions appear in generated predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionFormat {
    /// The integer itself; for columns storing epoch milliseconds.
    #[default]
    Raw,
    /// `{ts 'yyyy-MM-dd HH:mm:ss'}` escape understood by ODBC/JDBC drivers.
    JdbcTimestamp,
    /// The dialect's own timestamp literal.
    Native,
}

impl PositionFormat {
    pub fn render(&self, millis: i64, dialect: Dialect) -> String {
        match self {
            PositionFormat::Raw => millis.to_string(),
            PositionFormat::JdbcTimestamp => format!("{{ts '{}'}}", timestamp_text(millis)),
            PositionFormat::Native => dialect.format_timestamp_literal(&timestamp_text(millis)),
        }
    }
}

/// `yyyy-MM-dd HH:mm:ss`, with `.SSS` appended only when milliseconds are non-zero.
///
/// Positions outside chrono's range render as the raw integer.
pub fn timestamp_text(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) if dt.nanosecond() == 0 => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => millis.to_string(),
    }
}
