//! Scalar values, records and the per-render context.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single resolved value: the unit a placeholder binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Empty
    }
}

/// Report-facing date rendering, e.g. "05 March 2024".
pub const DATE_DISPLAY_FORMAT: &str = "%d %B %Y";
pub const TIME_DISPLAY_FORMAT: &str = "%H:%M:%S";

impl Scalar {
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Empty)
    }

    /// Numeric view: numbers directly, numeric-looking text parsed.
    /// Everything else is None (aggregations skip such values).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Display rendering: integers without decimals, dates as "DD Month YYYY".
    pub fn display(&self) -> String {
        match self {
            Scalar::Empty => String::new(),
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Scalar::Bool(b) => {
                if *b { "TRUE".to_string() } else { "FALSE".to_string() }
            }
            Scalar::Date(d) => d.format(DATE_DISPLAY_FORMAT).to_string(),
            Scalar::DateTime(dt) => {
                dt.format(&format!("{} {}", DATE_DISPLAY_FORMAT, TIME_DISPLAY_FORMAT))
                    .to_string()
            }
        }
    }

    /// Convert a JSON value, recognizing ISO dates and datetimes in strings.
    pub fn from_json(value: &serde_json::Value) -> Scalar {
        match value {
            serde_json::Value::Null => Scalar::Empty,
            serde_json::Value::Bool(b) => Scalar::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Scalar::Number(f),
                None => Scalar::Text(n.to_string()),
            },
            serde_json::Value::String(s) => Scalar::from_text(s),
            other => Scalar::Text(other.to_string()),
        }
    }

    /// Classify a text value: ISO date/datetime strings become dates.
    pub fn from_text(s: &str) -> Scalar {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Scalar::Empty;
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return Scalar::DateTime(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
            return Scalar::DateTime(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Scalar::Date(d);
        }
        Scalar::Text(s.to_string())
    }
}

/// One row of query results: column name → value.
pub type Record = HashMap<String, Scalar>;

/// Everything available during one render: query results keyed by name,
/// request parameters, and one-level nested groups. Built fresh per render.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Query results: name → list of records
    pub results: HashMap<String, Vec<Record>>,
    /// Request parameters and scalar context entries
    pub params: HashMap<String, Scalar>,
    /// Object-valued context entries (one level of nesting)
    pub groups: HashMap<String, Record>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_param(&mut self, name: &str, value: Scalar) {
        self.params.insert(name.to_string(), value);
    }

    pub fn set_result(&mut self, name: &str, records: Vec<Record>) {
        self.results.insert(name.to_string(), records);
    }

    /// Build a context from a JSON document. Top-level arrays of objects
    /// become query results, objects become nested groups, scalars become
    /// parameters. Anything else is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| "data file must be a JSON object".to_string())?;

        let mut ctx = RenderContext::new();
        for (key, entry) in map {
            match entry {
                serde_json::Value::Array(items) => {
                    let mut records = Vec::with_capacity(items.len());
                    for item in items {
                        match item.as_object() {
                            Some(obj) => {
                                let record: Record = obj
                                    .iter()
                                    .map(|(k, v)| (k.clone(), Scalar::from_json(v)))
                                    .collect();
                                records.push(record);
                            }
                            None => {
                                return Err(format!(
                                    "data source '{}' must contain objects",
                                    key
                                ));
                            }
                        }
                    }
                    ctx.results.insert(key.clone(), records);
                }
                serde_json::Value::Object(obj) => {
                    let group: Record = obj
                        .iter()
                        .map(|(k, v)| (k.clone(), Scalar::from_json(v)))
                        .collect();
                    ctx.groups.insert(key.clone(), group);
                }
                other => {
                    ctx.params.insert(key.clone(), Scalar::from_json(other));
                }
            }
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Number(10.0).display(), "10");
        assert_eq!(Scalar::Number(10.25).display(), "10.25");
        assert_eq!(Scalar::Empty.display(), "");
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(Scalar::Date(d).display(), "05 January 2024");
    }

    #[test]
    fn test_scalar_as_number() {
        assert_eq!(Scalar::Number(3.5).as_number(), Some(3.5));
        assert_eq!(Scalar::Text("42".to_string()).as_number(), Some(42.0));
        assert_eq!(Scalar::Text("abc".to_string()).as_number(), None);
        assert_eq!(Scalar::Empty.as_number(), None);
    }

    #[test]
    fn test_from_text_recognizes_iso_dates() {
        assert_eq!(
            Scalar::from_text("2024-01-02"),
            Scalar::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert!(matches!(
            Scalar::from_text("2024-01-02 13:45:00"),
            Scalar::DateTime(_)
        ));
        assert_eq!(
            Scalar::from_text("PGE 2B"),
            Scalar::Text("PGE 2B".to_string())
        );
    }

    #[test]
    fn test_context_from_json() {
        let doc = serde_json::json!({
            "transactions": [
                {"d": "2024-01-01", "q": 10},
                {"d": "2024-01-02", "q": 12}
            ],
            "estate": {"name": "PGE 2B", "code": 7},
            "start_date": "2024-01-01",
            "title": "Monthly Report"
        });

        let ctx = RenderContext::from_json(&doc).unwrap();
        assert_eq!(ctx.results["transactions"].len(), 2);
        assert_eq!(
            ctx.groups["estate"]["name"],
            Scalar::Text("PGE 2B".to_string())
        );
        assert!(matches!(ctx.params["start_date"], Scalar::Date(_)));
        assert_eq!(
            ctx.params["title"],
            Scalar::Text("Monthly Report".to_string())
        );
    }
}
