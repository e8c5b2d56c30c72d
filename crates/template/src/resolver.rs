//! Variable resolver: maps a variable name plus context to a concrete
//! scalar value.
//!
//! Declared definitions dispatch on the decoded `VariableDef` variant.
//! Undeclared names fall back through a fixed precedence chain over the
//! context. Individual failures are isolated: `resolve_all` keeps going
//! and reports them as warnings.

use std::collections::HashMap;

use chrono::Local;
use regex::Regex;

use crate::definitions::{AggregationKind, FilterDef, VariableDef};
use crate::error::ResolveError;
use crate::value::{Record, RenderContext, Scalar, DATE_DISPLAY_FORMAT, TIME_DISPLAY_FORMAT};

// =============================================================================
// Fallback lookup chain
// =============================================================================

/// Resolve an undeclared name against the context.
///
/// Precedence: exact parameter key, case-insensitive key, partial
/// (substring either way), one-level nested group lookup, built-in
/// date/time defaults. Returns None when nothing matches.
pub fn lookup(name: &str, ctx: &RenderContext) -> Option<Scalar> {
    // 1. Exact key
    if let Some(value) = ctx.params.get(name) {
        return Some(value.clone());
    }

    let lower = name.to_lowercase();

    // 2. Case-insensitive key
    for (key, value) in &ctx.params {
        if key.to_lowercase() == lower {
            return Some(value.clone());
        }
    }

    // 3. Partial match: name inside key, or key inside name
    for (key, value) in &ctx.params {
        let key_lower = key.to_lowercase();
        if key_lower.contains(&lower) || lower.contains(&key_lower) {
            return Some(value.clone());
        }
    }

    // 4. One-level nested group lookup
    for group in ctx.groups.values() {
        if let Some(value) = lookup_in_record(name, group) {
            return Some(value);
        }
    }

    // 5. Built-in date/time defaults
    builtin_default(name)
}

/// Resolve a name against one record: exact, case-insensitive, then
/// partial. Used per-row by the expander, where record fields take
/// priority over the global context.
pub fn lookup_in_record(name: &str, record: &Record) -> Option<Scalar> {
    if let Some(value) = record.get(name) {
        return Some(value.clone());
    }
    let lower = name.to_lowercase();
    for (key, value) in record {
        if key.to_lowercase() == lower {
            return Some(value.clone());
        }
    }
    for (key, value) in record {
        let key_lower = key.to_lowercase();
        if key_lower.contains(&lower) || lower.contains(&key_lower) {
            return Some(value.clone());
        }
    }
    None
}

/// Built-in defaults for date/time-ish names.
fn builtin_default(name: &str) -> Option<Scalar> {
    match name.to_lowercase().as_str() {
        "current_date" | "generated_date" | "report_date" => Some(Scalar::Text(
            Local::now().format(DATE_DISPLAY_FORMAT).to_string(),
        )),
        "current_time" | "generated_time" => Some(Scalar::Text(
            Local::now().format(TIME_DISPLAY_FORMAT).to_string(),
        )),
        _ => None,
    }
}

// =============================================================================
// Declared-definition dispatch
// =============================================================================

/// Resolve one variable. With a definition, dispatch on its kind; without,
/// fall back to the context lookup chain.
pub fn resolve(
    name: &str,
    def: Option<&VariableDef>,
    ctx: &RenderContext,
) -> Result<Scalar, ResolveError> {
    match def {
        Some(def) => resolve_def(name, def, ctx),
        None => lookup(name, ctx).ok_or_else(|| ResolveError::NotFound(name.to_string())),
    }
}

/// Resolve every declared variable. Failures are isolated: a failing
/// variable receives its declared default and contributes a warning,
/// never aborting the rest.
pub fn resolve_all(
    defs: &HashMap<String, VariableDef>,
    ctx: &RenderContext,
) -> (HashMap<String, Scalar>, Vec<String>) {
    let mut resolved = HashMap::with_capacity(defs.len());
    let mut warnings = Vec::new();

    for (name, def) in defs {
        match resolve_def(name, def, ctx) {
            Ok(value) => {
                resolved.insert(name.clone(), value);
            }
            Err(e) => {
                warnings.push(e.to_string());
                resolved.insert(name.clone(), def.default_value());
            }
        }
    }

    (resolved, warnings)
}

fn resolve_def(
    name: &str,
    def: &VariableDef,
    ctx: &RenderContext,
) -> Result<Scalar, ResolveError> {
    match def {
        VariableDef::Static {
            value,
            source,
            default,
        } => {
            if let Some(v) = value {
                return Ok(Scalar::from_json(v));
            }
            if let Some(key) = source {
                if let Some(v) = lookup(key, ctx) {
                    return Ok(v);
                }
            }
            Ok(default
                .as_ref()
                .map(Scalar::from_json)
                .unwrap_or(Scalar::Empty))
        }
        VariableDef::Parameter {
            name: param,
            default,
        } => {
            let key = param.as_deref().unwrap_or(name);
            if let Some(v) = ctx.params.get(key) {
                return Ok(v.clone());
            }
            Ok(default
                .as_ref()
                .map(Scalar::from_json)
                .unwrap_or(Scalar::Empty))
        }
        VariableDef::Dynamic { format } => {
            let text = format_strftime(Local::now().format(format)).ok_or_else(|| {
                ResolveError::BadExpression {
                    variable: name.to_string(),
                    expression: format.clone(),
                }
            })?;
            Ok(Scalar::Text(text))
        }
        VariableDef::Calculation { expression } => Ok(resolve_calculation(expression, ctx)),
        VariableDef::Aggregation {
            source,
            field,
            kind,
            filter,
        } => resolve_aggregation(name, source, field.as_deref(), *kind, filter.as_ref(), ctx),
        VariableDef::Conditional {
            conditions,
            default,
        } => {
            for clause in conditions {
                let lhs = lookup(&clause.field, ctx).unwrap_or(Scalar::Empty);
                let rhs = Scalar::from_json(&clause.value);
                if clause.op.apply(&lhs, &rhs) {
                    return Ok(Scalar::from_json(&clause.result));
                }
            }
            Ok(default
                .as_ref()
                .map(Scalar::from_json)
                .unwrap_or(Scalar::Empty))
        }
        VariableDef::Formatting { template } => Ok(Scalar::Text(render_template(template, ctx))),
        VariableDef::QueryResult {
            query,
            field,
            format,
        } => {
            let records = ctx
                .results
                .get(query)
                .ok_or_else(|| ResolveError::MissingSource {
                    variable: name.to_string(),
                    source: query.clone(),
                })?;
            let first = records.first().ok_or_else(|| ResolveError::MissingField {
                variable: name.to_string(),
                field: field.clone(),
            })?;
            let value = lookup_in_record(field, first).ok_or_else(|| {
                ResolveError::MissingField {
                    variable: name.to_string(),
                    field: field.clone(),
                }
            })?;
            let formatted = match (format, &value) {
                (Some(pat), Scalar::Date(d)) => Some((pat, format_strftime(d.format(pat)))),
                (Some(pat), Scalar::DateTime(dt)) => Some((pat, format_strftime(dt.format(pat)))),
                _ => None,
            };
            match formatted {
                Some((_, Some(text))) => Ok(Scalar::Text(text)),
                Some((pat, None)) => Err(ResolveError::BadExpression {
                    variable: name.to_string(),
                    expression: pat.clone(),
                }),
                None => Ok(value),
            }
        }
    }
}

// =============================================================================
// Calculation expressions
// =============================================================================

/// Characters permitted in a substituted calculation expression. Anything
/// else aborts evaluation and yields 0 (the expression string may come
/// from a configuration file).
const EXPRESSION_CHARSET: &str = "0123456789+-*/.() \t";

/// Substitute `{name}` / `{group.field}` tokens with numeric context
/// values, then evaluate. Charset violations and parse failures both
/// yield 0 rather than an error.
fn resolve_calculation(expression: &str, ctx: &RenderContext) -> Scalar {
    let token_re = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)\}").unwrap();
    let substituted = token_re.replace_all(expression, |caps: &regex::Captures| {
        format!("{}", numeric_token(&caps[1], ctx))
    });

    if !substituted
        .chars()
        .all(|c| EXPRESSION_CHARSET.contains(c))
    {
        return Scalar::Number(0.0);
    }

    match eval_expression(&substituted) {
        Some(n) => Scalar::Number(n),
        None => Scalar::Number(0.0),
    }
}

/// Numeric value of a `{name}` token: dotted names reach into nested
/// groups or the first record of a result list; anything unresolved or
/// non-numeric is 0.
fn numeric_token(name: &str, ctx: &RenderContext) -> f64 {
    if let Some((group, field)) = name.split_once('.') {
        if let Some(n) = ctx
            .groups
            .get(group)
            .and_then(|g| g.get(field))
            .and_then(|s| s.as_number())
        {
            return n;
        }
        if let Some(n) = ctx
            .results
            .get(group)
            .and_then(|r| r.first())
            .and_then(|r| r.get(field))
            .and_then(|s| s.as_number())
        {
            return n;
        }
        return 0.0;
    }
    lookup(name, ctx)
        .and_then(|s| s.as_number())
        .unwrap_or(0.0)
}

/// Recursive-descent evaluator over `+ - * / ( )` and f64 literals.
fn eval_expression(input: &str) -> Option<f64> {
    let mut parser = ExprParser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_whitespace();
    if parser.pos == parser.bytes.len() {
        Some(value)
    } else {
        None
    }
}

struct ExprParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl ExprParser<'_> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos] == b' ' || self.bytes[self.pos] == b'\t')
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.pos).copied()
    }

    fn expr(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                b'+' => {
                    self.pos += 1;
                    value += self.term()?;
                }
                b'-' => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                b'*' => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                b'/' => {
                    self.pos += 1;
                    // Plain f64 division; no zero-guard beyond what the
                    // expression author provides
                    value /= self.factor()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<f64> {
        match self.peek()? {
            b'-' => {
                self.pos += 1;
                Some(-self.factor()?)
            }
            b'(' => {
                self.pos += 1;
                let value = self.expr()?;
                if self.peek()? != b')' {
                    return None;
                }
                self.pos += 1;
                Some(value)
            }
            _ => self.number(),
        }
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_digit() || self.bytes[self.pos] == b'.')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }
}

// =============================================================================
// Aggregation
// =============================================================================

fn resolve_aggregation(
    name: &str,
    source: &str,
    field: Option<&str>,
    kind: AggregationKind,
    filter: Option<&FilterDef>,
    ctx: &RenderContext,
) -> Result<Scalar, ResolveError> {
    let records = ctx
        .results
        .get(source)
        .ok_or_else(|| ResolveError::MissingSource {
            variable: name.to_string(),
            source: source.to_string(),
        })?;

    let passing: Vec<&Record> = records
        .iter()
        .filter(|record| match filter {
            Some(f) => match record.get(&f.field) {
                Some(lhs) => f.op.apply(lhs, &Scalar::from_json(&f.value)),
                None => false,
            },
            None => true,
        })
        .collect();

    if kind == AggregationKind::Count {
        return Ok(Scalar::Number(passing.len() as f64));
    }

    let field = field.ok_or_else(|| ResolveError::MissingField {
        variable: name.to_string(),
        field: "<unset>".to_string(),
    })?;

    // Non-numeric and missing field values are skipped, not errors
    let values: Vec<f64> = passing
        .iter()
        .filter_map(|record| record.get(field))
        .filter_map(|v| v.as_number())
        .collect();

    let result = match kind {
        AggregationKind::Sum => values.iter().sum(),
        AggregationKind::Average => {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }
        AggregationKind::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregationKind::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregationKind::Count => unreachable!(),
    };

    // Empty input yields 0 for every kind
    if values.is_empty() {
        return Ok(Scalar::Number(0.0));
    }
    Ok(Scalar::Number(result))
}

// =============================================================================
// String templates
// =============================================================================

/// Substitute `{name}` / `{name:.2f}` tokens in a formatting template.
/// Unresolved names render as empty strings.
fn render_template(template: &str, ctx: &RenderContext) -> String {
    let token_re = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)(?::([^}]+))?\}").unwrap();
    token_re
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            let value = template_value(name, ctx).unwrap_or(Scalar::Empty);
            match caps.get(2) {
                Some(spec) => format_with_spec(&value, spec.as_str()),
                None => value.display(),
            }
        })
        .to_string()
}

fn template_value(name: &str, ctx: &RenderContext) -> Option<Scalar> {
    if let Some((group, field)) = name.split_once('.') {
        if let Some(v) = ctx.groups.get(group).and_then(|g| g.get(field)) {
            return Some(v.clone());
        }
        if let Some(v) = ctx
            .results
            .get(group)
            .and_then(|r| r.first())
            .and_then(|r| r.get(field))
        {
            return Some(v.clone());
        }
        return None;
    }
    lookup(name, ctx)
}

/// Apply a `format()`-style precision spec like `.2f`, or a strftime
/// pattern for dates. Unrecognized specs fall back to plain display.
fn format_with_spec(value: &Scalar, spec: &str) -> String {
    if let Some(precision) = spec
        .strip_prefix('.')
        .and_then(|rest| rest.strip_suffix('f'))
        .and_then(|digits| digits.parse::<usize>().ok())
    {
        if let Some(n) = value.as_number() {
            return format!("{:.*}", precision, n);
        }
    }
    let formatted = match value {
        Scalar::Date(d) if spec.contains('%') => format_strftime(d.format(spec)),
        Scalar::DateTime(dt) if spec.contains('%') => format_strftime(dt.format(spec)),
        _ => None,
    };
    formatted.unwrap_or_else(|| value.display())
}

/// Render a chrono `format(...)` result without panicking. Definition
/// files supply the pattern, and chrono surfaces a bad pattern (or an
/// item the value cannot fill) as `fmt::Error` — which `to_string`
/// would turn into a panic. Writing into a buffer keeps it recoverable.
fn format_strftime(display: impl std::fmt::Display) -> Option<String> {
    use std::fmt::Write;
    let mut out = String::new();
    match write!(out, "{}", display) {
        Ok(()) => Some(out),
        Err(_) => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{CompareOp, FormulaFile};

    fn context() -> RenderContext {
        let doc = serde_json::json!({
            "transactions": [
                {"qty": 2, "status": "OK", "driver": "Budi"},
                {"qty": 3, "status": "OK", "driver": "Sari"},
                {"qty": 5, "status": "HOLD", "driver": "Tono"}
            ],
            "estate": {"name": "PGE 2B", "code": 7},
            "a": 3,
            "b": 4,
            "Estate_Name": "X",
            "est": "Y",
            "start_date": "2024-01-01",
            "end_date": "2024-01-31"
        });
        RenderContext::from_json(&doc).unwrap()
    }

    #[test]
    fn test_lookup_precedence_case_insensitive() {
        let ctx = context();
        // No exact match for "estate_name"; case-insensitive finds
        // "Estate_Name"
        assert_eq!(
            lookup("estate_name", &ctx),
            Some(Scalar::Text("X".to_string()))
        );
    }

    #[test]
    fn test_lookup_precedence_partial() {
        let mut ctx = RenderContext::new();
        ctx.set_param("est", Scalar::Text("Y".to_string()));
        assert_eq!(lookup("estate", &ctx), Some(Scalar::Text("Y".to_string())));
    }

    #[test]
    fn test_lookup_nested_group() {
        let ctx = context();
        assert_eq!(lookup("code", &ctx), Some(Scalar::Number(7.0)));
    }

    #[test]
    fn test_lookup_builtin_dates() {
        let ctx = RenderContext::new();
        assert!(matches!(lookup("current_date", &ctx), Some(Scalar::Text(_))));
        assert!(matches!(lookup("generated_time", &ctx), Some(Scalar::Text(_))));
        assert_eq!(lookup("no_such_thing", &ctx), None);
    }

    #[test]
    fn test_calculation() {
        let ctx = context();
        let def = VariableDef::Calculation {
            expression: "{a} + {b} * 2".to_string(),
        };
        assert_eq!(
            resolve("calc", Some(&def), &ctx).unwrap(),
            Scalar::Number(11.0)
        );
    }

    #[test]
    fn test_calculation_rejects_foreign_characters() {
        let ctx = context();
        let def = VariableDef::Calculation {
            expression: "__import__('os')".to_string(),
        };
        assert_eq!(
            resolve("calc", Some(&def), &ctx).unwrap(),
            Scalar::Number(0.0)
        );
    }

    #[test]
    fn test_calculation_parse_failure_yields_zero() {
        let ctx = context();
        let def = VariableDef::Calculation {
            expression: "((1 + 2".to_string(),
        };
        assert_eq!(
            resolve("calc", Some(&def), &ctx).unwrap(),
            Scalar::Number(0.0)
        );
    }

    #[test]
    fn test_eval_expression() {
        assert_eq!(eval_expression("3 + 4 * 2"), Some(11.0));
        assert_eq!(eval_expression("(3 + 4) * 2"), Some(14.0));
        assert_eq!(eval_expression("-2 * 3"), Some(-6.0));
        assert_eq!(eval_expression("10 / 4"), Some(2.5));
        assert_eq!(eval_expression(""), None);
        assert_eq!(eval_expression("1 +"), None);
    }

    #[test]
    fn test_aggregation_sum_and_average() {
        let ctx = context();
        let sum = VariableDef::Aggregation {
            source: "transactions".to_string(),
            field: Some("qty".to_string()),
            kind: AggregationKind::Sum,
            filter: None,
        };
        assert_eq!(
            resolve("total", Some(&sum), &ctx).unwrap(),
            Scalar::Number(10.0)
        );

        let avg = VariableDef::Aggregation {
            source: "transactions".to_string(),
            field: Some("qty".to_string()),
            kind: AggregationKind::Average,
            filter: None,
        };
        assert_eq!(
            resolve("avg", Some(&avg), &ctx).unwrap(),
            Scalar::Number(10.0 / 3.0)
        );
    }

    #[test]
    fn test_aggregation_with_filter() {
        let ctx = context();
        let def = VariableDef::Aggregation {
            source: "transactions".to_string(),
            field: Some("qty".to_string()),
            kind: AggregationKind::Sum,
            filter: Some(FilterDef {
                field: "status".to_string(),
                op: CompareOp::Eq,
                value: serde_json::json!("OK"),
            }),
        };
        assert_eq!(
            resolve("ok_total", Some(&def), &ctx).unwrap(),
            Scalar::Number(5.0)
        );
    }

    #[test]
    fn test_aggregation_empty_source_yields_zero() {
        let mut ctx = RenderContext::new();
        ctx.set_result("empty", Vec::new());
        for kind in [
            AggregationKind::Sum,
            AggregationKind::Count,
            AggregationKind::Average,
            AggregationKind::Max,
            AggregationKind::Min,
        ] {
            let def = VariableDef::Aggregation {
                source: "empty".to_string(),
                field: Some("qty".to_string()),
                kind,
                filter: None,
            };
            assert_eq!(
                resolve("agg", Some(&def), &ctx).unwrap(),
                Scalar::Number(0.0),
                "kind {:?}",
                kind
            );
        }
    }

    #[test]
    fn test_aggregation_missing_source_is_error() {
        let ctx = RenderContext::new();
        let def = VariableDef::Aggregation {
            source: "nowhere".to_string(),
            field: Some("qty".to_string()),
            kind: AggregationKind::Sum,
            filter: None,
        };
        assert!(resolve("agg", Some(&def), &ctx).is_err());
    }

    #[test]
    fn test_conditional_first_match_wins() {
        let mut ctx = RenderContext::new();
        ctx.set_param("diff", Scalar::Number(5.0));
        let json = r#"{
            "variables": {
                "label": {
                    "type": "conditional",
                    "conditions": [
                        {"field": "diff", "operator": ">", "value": 0, "result": "Over"},
                        {"field": "diff", "operator": "<", "value": 0, "result": "Short"}
                    ],
                    "default": "Balanced"
                }
            }
        }"#;
        let defs = FormulaFile::parse(json).unwrap();
        assert_eq!(
            resolve("label", defs.variables.get("label"), &ctx).unwrap(),
            Scalar::Text("Over".to_string())
        );

        ctx.set_param("diff", Scalar::Number(0.0));
        assert_eq!(
            resolve("label", defs.variables.get("label"), &ctx).unwrap(),
            Scalar::Text("Balanced".to_string())
        );
    }

    #[test]
    fn test_formatting_template() {
        let ctx = context();
        let def = VariableDef::Formatting {
            template: "Period {start_date} - {end_date}".to_string(),
        };
        assert_eq!(
            resolve("period", Some(&def), &ctx).unwrap(),
            Scalar::Text("Period 01 January 2024 - 31 January 2024".to_string())
        );
    }

    #[test]
    fn test_formatting_precision_spec() {
        let mut ctx = RenderContext::new();
        ctx.set_param("rate", Scalar::Number(97.34567));
        let def = VariableDef::Formatting {
            template: "{rate:.2f}%".to_string(),
        };
        assert_eq!(
            resolve("rate_label", Some(&def), &ctx).unwrap(),
            Scalar::Text("97.35%".to_string())
        );
    }

    #[test]
    fn test_resolve_all_survives_bad_dynamic_format() {
        // A malformed strftime pattern must degrade to a warning, not
        // take down the rest of the variables
        let ctx = RenderContext::new();
        let json = r#"{
            "variables": {
                "stamp": {"type": "dynamic", "format": "%Q"},
                "other": {"type": "static", "value": "ok"}
            }
        }"#;
        let defs = FormulaFile::parse(json).unwrap();
        let (resolved, warnings) = resolve_all(&defs.variables, &ctx);

        assert_eq!(resolved["other"], Scalar::Text("ok".to_string()));
        assert_eq!(resolved["stamp"], Scalar::Empty);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("stamp"));
    }

    #[test]
    fn test_query_result_bad_date_format_is_error() {
        let mut ctx = RenderContext::new();
        let d = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut record = Record::new();
        record.insert("when".to_string(), Scalar::Date(d));
        ctx.set_result("events", vec![record]);

        let bad = VariableDef::QueryResult {
            query: "events".to_string(),
            field: "when".to_string(),
            format: Some("%Q".to_string()),
        };
        assert_eq!(
            resolve("event_date", Some(&bad), &ctx),
            Err(ResolveError::BadExpression {
                variable: "event_date".to_string(),
                expression: "%Q".to_string(),
            })
        );

        let good = VariableDef::QueryResult {
            query: "events".to_string(),
            field: "when".to_string(),
            format: Some("%d/%m/%Y".to_string()),
        };
        assert_eq!(
            resolve("event_date", Some(&good), &ctx).unwrap(),
            Scalar::Text("05/03/2024".to_string())
        );
    }

    #[test]
    fn test_formatting_bad_date_spec_falls_back_to_display() {
        let mut ctx = RenderContext::new();
        let d = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        ctx.set_param("when", Scalar::Date(d));

        let def = VariableDef::Formatting {
            template: "as of {when:%Q}".to_string(),
        };
        assert_eq!(
            resolve("header", Some(&def), &ctx).unwrap(),
            Scalar::Text("as of 05 March 2024".to_string())
        );
    }

    #[test]
    fn test_query_result() {
        let ctx = context();
        let def = VariableDef::QueryResult {
            query: "transactions".to_string(),
            field: "driver".to_string(),
            format: None,
        };
        assert_eq!(
            resolve("first_driver", Some(&def), &ctx).unwrap(),
            Scalar::Text("Budi".to_string())
        );
    }

    #[test]
    fn test_resolve_all_isolates_failures() {
        let ctx = context();
        let json = r#"{
            "variables": {
                "good": {"type": "calculation", "expression": "{a} + {b}"},
                "bad": {"type": "query_result", "query": "missing", "field": "x"},
                "also_good": {"type": "static", "value": "ok"}
            }
        }"#;
        let defs = FormulaFile::parse(json).unwrap();
        let (resolved, warnings) = resolve_all(&defs.variables, &ctx);

        assert_eq!(resolved["good"], Scalar::Number(7.0));
        assert_eq!(resolved["also_good"], Scalar::Text("ok".to_string()));
        assert_eq!(resolved["bad"], Scalar::Empty);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_missing_name_degrades_to_not_found() {
        let ctx = RenderContext::new();
        assert_eq!(
            resolve("ghost", None, &ctx),
            Err(ResolveError::NotFound("ghost".to_string()))
        );
    }
}
