//! Variable/formula definition file model.
//!
//! Definitions are decoded once at load time into a closed enum, one
//! variant per `type` tag, so resolution never re-branches on strings.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::TemplateError;
use crate::value::Scalar;

/// A declarative variable rule, keyed by variable name in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableDef {
    /// Literal configured value, or a named context key with a default.
    #[serde(alias = "direct")]
    Static {
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        default: Option<serde_json::Value>,
    },
    /// Named request parameter, with a default.
    Parameter {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        default: Option<serde_json::Value>,
    },
    /// Current date/time rendered with a strftime pattern.
    Dynamic {
        #[serde(default = "default_dynamic_format")]
        format: String,
    },
    /// Arithmetic over `{name}` tokens substituted from the context.
    Calculation { expression: String },
    /// Aggregate over a named field of a record list.
    Aggregation {
        source: String,
        #[serde(default)]
        field: Option<String>,
        #[serde(rename = "aggregation_type")]
        kind: AggregationKind,
        #[serde(default)]
        filter: Option<FilterDef>,
    },
    /// Ordered condition clauses; first match wins.
    Conditional {
        #[serde(default)]
        conditions: Vec<ConditionClause>,
        #[serde(default)]
        default: Option<serde_json::Value>,
    },
    /// String template with `{param}` substitution from the context.
    Formatting { template: String },
    /// A named field from the first record of a named query result.
    QueryResult {
        query: String,
        field: String,
        #[serde(default)]
        format: Option<String>,
    },
}

impl VariableDef {
    /// The declared fallback for this definition when resolution fails.
    pub fn default_value(&self) -> Scalar {
        let default = match self {
            VariableDef::Static { default, value, .. } => {
                default.as_ref().or(value.as_ref())
            }
            VariableDef::Parameter { default, .. } => default.as_ref(),
            VariableDef::Conditional { default, .. } => default.as_ref(),
            _ => None,
        };
        match default {
            Some(v) => Scalar::from_json(v),
            None => Scalar::Empty,
        }
    }
}

fn default_dynamic_format() -> String {
    crate::value::DATE_DISPLAY_FORMAT.to_string()
}

/// Aggregation kinds over a record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    Sum,
    Count,
    Average,
    Max,
    Min,
}

/// Comparison operators shared by filters and conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
}

impl CompareOp {
    /// Apply the operator to a field value and a comparison operand.
    /// Numeric comparison when both sides are numeric, else string
    /// comparison on display text.
    pub fn apply(&self, lhs: &Scalar, rhs: &Scalar) -> bool {
        if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
            return match self {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Gt => a > b,
                CompareOp::Lt => a < b,
                CompareOp::Ge => a >= b,
                CompareOp::Le => a <= b,
                CompareOp::Contains => lhs.display().contains(&rhs.display()),
            };
        }
        let a = lhs.display();
        let b = rhs.display();
        match self {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Gt => a > b,
            CompareOp::Lt => a < b,
            CompareOp::Ge => a >= b,
            CompareOp::Le => a <= b,
            CompareOp::Contains => a.contains(&b),
        }
    }
}

/// A record filter for aggregations.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterDef {
    pub field: String,
    #[serde(rename = "operator")]
    pub op: CompareOp,
    pub value: serde_json::Value,
}

/// One clause of a conditional variable.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionClause {
    pub field: String,
    #[serde(rename = "operator")]
    pub op: CompareOp,
    pub value: serde_json::Value,
    pub result: serde_json::Value,
}

/// Placement hint binding a sheet/section name to a data-source key.
#[derive(Debug, Clone, Deserialize)]
pub struct RepeatingSection {
    pub source: String,
    #[serde(default)]
    pub sheet: Option<String>,
}

/// The parsed formula/variable definition file.
///
/// The file's `queries` section belongs to the database collaborator and
/// is ignored here.
#[derive(Debug, Clone, Default)]
pub struct FormulaFile {
    pub variables: HashMap<String, VariableDef>,
    pub repeating_sections: HashMap<String, RepeatingSection>,
}

impl FormulaFile {
    /// Load and decode a definition file. Each variable entry is decoded
    /// individually so a malformed entry names the offending variable.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TemplateError::DefinitionLoad(format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        let doc: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| TemplateError::DefinitionLoad(format!("invalid JSON: {}", e)))?;

        let mut file = FormulaFile::default();

        if let Some(variables) = doc.get("variables").and_then(|v| v.as_object()) {
            for (name, entry) in variables {
                let def: VariableDef =
                    serde_json::from_value(entry.clone()).map_err(|e| {
                        TemplateError::DefinitionParse {
                            variable: name.clone(),
                            message: e.to_string(),
                        }
                    })?;
                file.variables.insert(name.clone(), def);
            }
        }

        if let Some(sections) = doc.get("repeating_sections").and_then(|v| v.as_object()) {
            for (name, entry) in sections {
                let section: RepeatingSection =
                    serde_json::from_value(entry.clone()).map_err(|e| {
                        TemplateError::DefinitionParse {
                            variable: name.clone(),
                            message: e.to_string(),
                        }
                    })?;
                file.repeating_sections.insert(name.clone(), section);
            }
        }

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variable_types() {
        let json = r#"{
            "queries": {"monthly": "SELECT * FROM T{month}"},
            "variables": {
                "title": {"type": "static", "value": "Laporan Harian"},
                "estate_code": {"type": "direct", "source": "estate_code", "default": ""},
                "estate_name": {"type": "parameter", "name": "estate", "default": "Unknown"},
                "printed_at": {"type": "dynamic", "format": "%d %B %Y"},
                "net_total": {"type": "calculation", "expression": "{gross} - {deduction}"},
                "total_qty": {
                    "type": "aggregation",
                    "source": "transactions",
                    "field": "qty",
                    "aggregation_type": "sum",
                    "filter": {"field": "status", "operator": "==", "value": "OK"}
                },
                "balance_label": {
                    "type": "conditional",
                    "conditions": [
                        {"field": "diff", "operator": ">", "value": 0, "result": "Over"},
                        {"field": "diff", "operator": "<", "value": 0, "result": "Short"}
                    ],
                    "default": "Balanced"
                },
                "period": {"type": "formatting", "template": "{start_date} - {end_date}"},
                "first_driver": {"type": "query_result", "query": "transactions", "field": "driver"}
            },
            "repeating_sections": {
                "Detail": {"source": "transactions"}
            }
        }"#;

        let file = FormulaFile::parse(json).unwrap();
        assert_eq!(file.variables.len(), 9);
        assert!(matches!(
            file.variables["title"],
            VariableDef::Static { .. }
        ));
        assert!(matches!(
            file.variables["estate_code"],
            VariableDef::Static { .. }
        ));
        assert!(matches!(
            file.variables["total_qty"],
            VariableDef::Aggregation {
                kind: AggregationKind::Sum,
                ..
            }
        ));
        assert_eq!(file.repeating_sections["Detail"].source, "transactions");
    }

    #[test]
    fn test_malformed_variable_names_the_entry() {
        let json = r#"{
            "variables": {
                "bad": {"type": "aggregation", "source": "t"}
            }
        }"#;
        match FormulaFile::parse(json) {
            Err(TemplateError::DefinitionParse { variable, .. }) => {
                assert_eq!(variable, "bad");
            }
            other => panic!("expected DefinitionParse, got {:?}", other),
        }
    }

    #[test]
    fn test_compare_op_numeric_and_string() {
        let two = Scalar::Number(2.0);
        let three = Scalar::Number(3.0);
        assert!(CompareOp::Lt.apply(&two, &three));
        assert!(!CompareOp::Ge.apply(&two, &three));

        let name = Scalar::Text("PGE 2B".to_string());
        let needle = Scalar::Text("2B".to_string());
        assert!(CompareOp::Contains.apply(&name, &needle));
        assert!(CompareOp::Ne.apply(&name, &needle));
    }

    #[test]
    fn test_default_value() {
        let def = VariableDef::Parameter {
            name: Some("estate".to_string()),
            default: Some(serde_json::json!("Unknown")),
        };
        assert_eq!(def.default_value(), Scalar::Text("Unknown".to_string()));

        let no_default = VariableDef::Calculation {
            expression: "{a}".to_string(),
        };
        assert_eq!(no_default.default_value(), Scalar::Empty);
    }
}
