//! The render pipeline: load a template workbook, scan and classify its
//! placeholders, then bind one context to produce a finished report.

use std::path::Path;

use lapor_engine::sheet::Sheet;
use lapor_engine::workbook::Workbook;

use crate::definitions::FormulaFile;
use crate::error::TemplateError;
use crate::expander;
use crate::patterns::{detect_patterns, Pattern};
use crate::resolver;
use crate::scanner::{self, ScanResult};
use crate::value::{Record, RenderContext, Scalar};

// =============================================================================
// Render report
// =============================================================================

/// Outcome summary of one render.
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub sheets_rendered: usize,
    pub placeholders_bound: usize,
    pub rows_expanded: usize,
    pub warnings: Vec<String>,
    /// True when at least one sheet failed and was left unbound
    pub partial: bool,
}

impl RenderReport {
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Rendered {} sheet(s): {} placeholder(s) bound, {} row(s) expanded",
            self.sheets_rendered, self.placeholders_bound, self.rows_expanded
        );
        if self.partial {
            s.push_str(" (partial: some sheets failed)");
        }
        if !self.warnings.is_empty() {
            s.push_str(&format!(", {} warning(s)", self.warnings.len()));
        }
        s
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// A loaded template: the workbook plus per-sheet scan results and
/// detected patterns. Immutable once opened; each render works on a
/// deep copy.
pub struct TemplateRenderer {
    template: Workbook,
    definitions: FormulaFile,
    scans: Vec<ScanResult>,
    patterns: Vec<Vec<Pattern>>,
}

impl TemplateRenderer {
    /// Load a template workbook and (optionally) its variable
    /// definitions, then scan every sheet.
    pub fn open(
        template_path: &Path,
        formula_path: Option<&Path>,
    ) -> Result<(Self, String), TemplateError> {
        let (template, import_result) = lapor_io::xlsx::import(template_path)
            .map_err(TemplateError::TemplateLoad)?;

        let definitions = match formula_path {
            Some(path) => FormulaFile::load(path)?,
            None => FormulaFile::default(),
        };

        Ok((Self::from_parts(template, definitions), import_result.summary()))
    }

    /// Build a renderer from an already-loaded workbook.
    pub fn from_parts(template: Workbook, definitions: FormulaFile) -> Self {
        let scans: Vec<ScanResult> = template.sheets().iter().map(scanner::scan).collect();
        let patterns: Vec<Vec<Pattern>> = template
            .sheets()
            .iter()
            .zip(&scans)
            .map(|(sheet, scan)| detect_patterns(sheet, scan))
            .collect();
        Self {
            template,
            definitions,
            scans,
            patterns,
        }
    }

    pub fn template(&self) -> &Workbook {
        &self.template
    }

    pub fn definitions(&self) -> &FormulaFile {
        &self.definitions
    }

    pub fn scan_for(&self, sheet_index: usize) -> Option<&ScanResult> {
        self.scans.get(sheet_index)
    }

    pub fn patterns_for(&self, sheet_index: usize) -> Option<&[Pattern]> {
        self.patterns.get(sheet_index).map(|p| p.as_slice())
    }

    /// Bind one context: resolve declared variables, substitute
    /// singleton placeholders, expand repeating patterns. Sheets fail
    /// independently; a failed sheet is left as copied and flagged.
    pub fn render(&self, ctx: &RenderContext) -> Result<(Workbook, RenderReport), TemplateError> {
        let mut output = self.template.deep_copy();
        let mut report = RenderReport::default();

        // Declared variables become parameters for everything downstream
        let (resolved, mut warnings) = resolver::resolve_all(&self.definitions.variables, ctx);
        let mut working = ctx.clone();
        for (name, value) in resolved {
            working.params.insert(name, value);
        }
        report.warnings.append(&mut warnings);

        for (index, sheet) in output.sheets_mut().iter_mut().enumerate() {
            let scan = &self.scans[index];
            let patterns = &self.patterns[index];
            if scan.is_empty() && patterns.is_empty() {
                continue;
            }

            match render_sheet(sheet, scan, patterns, &self.definitions, &working) {
                Ok(outcome) => {
                    report.sheets_rendered += 1;
                    report.placeholders_bound += outcome.placeholders_bound;
                    report.rows_expanded += outcome.rows_expanded;
                    report.warnings.extend(outcome.warnings);
                }
                Err(e) => {
                    eprintln!("[render] sheet '{}' failed: {}", sheet.name, e);
                    report
                        .warnings
                        .push(format!("sheet '{}' left unbound: {}", sheet.name, e));
                    report.partial = true;
                }
            }
        }

        eprintln!("[render] {}", report.summary());
        Ok((output, report))
    }

    /// Render and write the result to an xlsx file.
    pub fn render_to_file(
        &self,
        ctx: &RenderContext,
        output_path: &Path,
    ) -> Result<RenderReport, TemplateError> {
        let (workbook, report) = self.render(ctx)?;
        lapor_io::xlsx::export(&workbook, output_path).map_err(TemplateError::Save)?;
        Ok(report)
    }
}

// =============================================================================
// Per-sheet rendering
// =============================================================================

struct SheetOutcome {
    placeholders_bound: usize,
    rows_expanded: usize,
    warnings: Vec<String>,
}

fn render_sheet(
    sheet: &mut Sheet,
    scan: &ScanResult,
    patterns: &[Pattern],
    definitions: &FormulaFile,
    ctx: &RenderContext,
) -> Result<SheetOutcome, String> {
    let mut outcome = SheetOutcome {
        placeholders_bound: 0,
        rows_expanded: 0,
        warnings: Vec::new(),
    };

    let template_rows: Vec<usize> = patterns.iter().map(|p| p.template_row()).collect();

    // Singleton pass first, while scan coordinates are still valid.
    // Template rows belong to the expansion pass.
    substitute_singletons(sheet, scan, &template_rows, ctx, &mut outcome);

    // Expand bottom-up so earlier template rows keep their coordinates
    for pattern in patterns.iter().rev() {
        let records = find_records(&sheet.name, pattern, definitions, ctx);
        let records: &[Record] = records.map(|r| r.as_slice()).unwrap_or(&[]);

        let (rows, warnings) = expander::expand(sheet, pattern, records, ctx, scan);
        outcome.rows_expanded += rows;
        outcome.warnings.extend(warnings);
    }

    Ok(outcome)
}

/// Substitute placeholders outside template rows. A cell holding nothing
/// but one token gets a typed value; mixed text gets string substitution.
/// Unresolvable names are left in place and reported once.
fn substitute_singletons(
    sheet: &mut Sheet,
    scan: &ScanResult,
    template_rows: &[usize],
    ctx: &RenderContext,
    outcome: &mut SheetOutcome,
) {
    let mut missing: Vec<String> = Vec::new();
    let by_row = scan.by_row();

    let mut rows: Vec<usize> = by_row.keys().copied().collect();
    rows.sort_unstable();

    for row in rows {
        if template_rows.contains(&row) {
            continue;
        }
        let mut cols: Vec<usize> = by_row[&row].iter().map(|(col, _)| *col).collect();
        cols.sort_unstable();
        cols.dedup();

        for col in cols {
            let text = match sheet.get_value(row, col).as_text().map(|t| t.to_string()) {
                Some(t) => t,
                None => continue,
            };
            let names = scan.names_at(row, col);

            if names.len() == 1 && scanner::is_sole_token(&text, names[0]) {
                match resolver::lookup(names[0], ctx) {
                    Some(value) => {
                        write_scalar(sheet, row, col, &value);
                        outcome.placeholders_bound += 1;
                    }
                    None => note_missing(names[0], &mut missing),
                }
                continue;
            }

            let mut rendered = text.clone();
            for name in &names {
                match resolver::lookup(name, ctx) {
                    Some(value) => {
                        rendered = scanner::substitute(&rendered, name, &value.display());
                        outcome.placeholders_bound += 1;
                    }
                    None => note_missing(name, &mut missing),
                }
            }
            if rendered != text {
                sheet.set_text(row, col, &rendered);
            }
        }
    }

    for name in missing {
        outcome.warnings.push(format!(
            "sheet '{}': no value for '{}', placeholder left in place",
            sheet.name, name
        ));
    }
}

fn note_missing(name: &str, missing: &mut Vec<String>) {
    if !missing.iter().any(|m| m == name) {
        missing.push(name.to_string());
    }
}

fn write_scalar(sheet: &mut Sheet, row: usize, col: usize, value: &Scalar) {
    match value {
        Scalar::Empty => sheet.clear_value(row, col),
        Scalar::Number(n) => sheet.set_number(row, col, *n),
        Scalar::Bool(b) => sheet.set_bool(row, col, *b),
        other => sheet.set_text(row, col, &other.display()),
    }
}

// =============================================================================
// Data source selection
// =============================================================================

/// Conventional result-set names tried when nothing else matches.
const CONVENTIONAL_SOURCES: [&str; 4] = ["data", "rows", "records", "items"];

/// Minimum fraction of table headers that must match record fields for
/// the structural fallback to accept a result set.
const HEADER_MATCH_THRESHOLD: f64 = 0.5;

/// Pick the result set feeding a pattern: exact sheet name, declared
/// repeating section, conventional names, then structural header
/// matching.
fn find_records<'a>(
    sheet_name: &str,
    pattern: &Pattern,
    definitions: &FormulaFile,
    ctx: &'a RenderContext,
) -> Option<&'a Vec<Record>> {
    // 1. Result set named after the sheet
    if let Some(records) = ctx.results.get(sheet_name) {
        return Some(records);
    }

    // 2. Declared repeating section bound to this sheet
    for section in definitions.repeating_sections.values() {
        let applies = match &section.sheet {
            Some(target) => target.eq_ignore_ascii_case(sheet_name),
            None => true,
        };
        if applies {
            if let Some(records) = ctx.results.get(&section.source) {
                return Some(records);
            }
        }
    }

    // 3. Conventional names, plus the normalized sheet name
    let normalized = sheet_name.to_lowercase().replace(' ', "_");
    for key in CONVENTIONAL_SOURCES.iter().copied().chain([normalized.as_str()]) {
        if let Some(records) = ctx.results.get(key) {
            return Some(records);
        }
    }

    // 4. Structural match against table headers
    let headers = pattern.headers();
    if headers.is_empty() {
        return None;
    }
    for records in ctx.results.values() {
        if let Some(first) = records.first() {
            if header_match_fraction(headers, first) >= HEADER_MATCH_THRESHOLD {
                return Some(records);
            }
        }
    }
    None
}

/// Fraction of headers with a case-insensitive substring counterpart
/// among the record's field names.
fn header_match_fraction(headers: &[String], record: &Record) -> f64 {
    let fields: Vec<String> = record.keys().map(|k| k.to_lowercase()).collect();
    let matched = headers
        .iter()
        .filter(|header| {
            let h = header.to_lowercase();
            fields
                .iter()
                .any(|f| f.contains(&h) || h.contains(f))
        })
        .count();
    matched as f64 / headers.len() as f64
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lapor_engine::cell::CellValue;

    fn renderer_for(sheet: Sheet, definitions: FormulaFile) -> TemplateRenderer {
        let workbook = Workbook::from_sheets(vec![sheet], 0);
        TemplateRenderer::from_parts(workbook, definitions)
    }

    #[test]
    fn test_singleton_substitution_typed_and_mixed() {
        let mut sheet = Sheet::new_with_name(20, 10, "Laporan");
        sheet.set_text(0, 0, "{{estate_name}}");
        sheet.set_text(1, 0, "Total: {{total}} ton");

        let renderer = renderer_for(sheet, FormulaFile::default());

        let mut ctx = RenderContext::new();
        ctx.set_param("estate_name", Scalar::Text("PGE 2B".into()));
        ctx.set_param("total", Scalar::Number(42.0));

        let (output, report) = renderer.render(&ctx).unwrap();
        let sheet = output.sheet(0).unwrap();
        assert_eq!(
            sheet.get_value(0, 0),
            CellValue::Text("PGE 2B".to_string())
        );
        assert_eq!(
            sheet.get_value(1, 0),
            CellValue::Text("Total: 42 ton".to_string())
        );
        assert_eq!(report.placeholders_bound, 2);
        assert!(!report.partial);
    }

    #[test]
    fn test_missing_variable_leaves_placeholder_and_warns() {
        let mut sheet = Sheet::new_with_name(10, 5, "Laporan");
        sheet.set_text(0, 0, "{{nothing_matches_this}}");

        let renderer = renderer_for(sheet, FormulaFile::default());
        let (output, report) = renderer.render(&RenderContext::new()).unwrap();

        assert_eq!(
            output.sheet(0).unwrap().get_value(0, 0),
            CellValue::Text("{{nothing_matches_this}}".to_string())
        );
        assert!(report.has_warnings());
        assert!(!report.partial);
    }

    #[test]
    fn test_table_expansion_via_sheet_name_source() {
        let mut sheet = Sheet::new_with_name(30, 10, "Transaksi");
        sheet.set_text(4, 0, "Date");
        sheet.set_text(4, 1, "Qty");
        sheet.set_text(5, 0, "{{date}}");
        sheet.set_text(5, 1, "{{qty}}");

        let renderer = renderer_for(sheet, FormulaFile::default());

        let doc = serde_json::json!({
            "Transaksi": [
                {"date": "2024-01-01", "qty": 10},
                {"date": "2024-01-02", "qty": 12}
            ]
        });
        let ctx = RenderContext::from_json(&doc).unwrap();

        let (output, report) = renderer.render(&ctx).unwrap();
        let sheet = output.sheet(0).unwrap();
        assert_eq!(report.rows_expanded, 2);
        assert_eq!(
            sheet.get_value(5, 0),
            CellValue::Text("01 January 2024".to_string())
        );
        assert_eq!(sheet.get_value(6, 1), CellValue::Number(12.0));
    }

    #[test]
    fn test_structural_header_matching() {
        let mut sheet = Sheet::new_with_name(30, 10, "Sheet1");
        sheet.set_text(0, 0, "Tanggal");
        sheet.set_text(0, 1, "Berat Netto");
        sheet.set_text(1, 0, "{{tanggal}}");
        sheet.set_text(1, 1, "{{netto}}");

        let renderer = renderer_for(sheet, FormulaFile::default());

        // Result set name matches nothing; headers match record fields
        let doc = serde_json::json!({
            "weighbridge": [
                {"tanggal": "2024-02-01", "berat_netto": 1530.5}
            ]
        });
        let ctx = RenderContext::from_json(&doc).unwrap();

        let (output, report) = renderer.render(&ctx).unwrap();
        assert_eq!(report.rows_expanded, 1);
        assert_eq!(
            output.sheet(0).unwrap().get_value(1, 1),
            CellValue::Number(1530.5)
        );
    }

    #[test]
    fn test_zero_records_leaves_table_untouched() {
        let mut sheet = Sheet::new_with_name(30, 10, "Laporan");
        sheet.set_text(0, 0, "Date");
        sheet.set_text(0, 1, "Qty");
        sheet.set_text(1, 0, "{{date}}");
        sheet.set_text(1, 1, "{{qty}}");

        let renderer = renderer_for(sheet, FormulaFile::default());
        let (output, report) = renderer.render(&RenderContext::new()).unwrap();

        assert_eq!(report.rows_expanded, 0);
        assert!(report.has_warnings());
        assert_eq!(
            output.sheet(0).unwrap().get_value(1, 0),
            CellValue::Text("{{date}}".to_string())
        );
    }

    #[test]
    fn test_declared_variables_feed_singletons() {
        let mut sheet = Sheet::new_with_name(10, 5, "Laporan");
        sheet.set_text(0, 0, "{{grand_total}}");

        let json = r#"{
            "variables": {
                "grand_total": {
                    "type": "aggregation",
                    "source": "rows",
                    "field": "qty",
                    "aggregation_type": "sum"
                }
            }
        }"#;
        let definitions = FormulaFile::parse(json).unwrap();
        let renderer = renderer_for(sheet, definitions);

        let doc = serde_json::json!({
            "rows": [{"qty": 4}, {"qty": 6}]
        });
        let ctx = RenderContext::from_json(&doc).unwrap();

        let (output, _) = renderer.render(&ctx).unwrap();
        assert_eq!(
            output.sheet(0).unwrap().get_value(0, 0),
            CellValue::Number(10.0)
        );
    }

    #[test]
    fn test_repeating_section_binds_named_source() {
        let mut sheet = Sheet::new_with_name(30, 10, "Rincian");
        sheet.set_text(0, 0, "No");
        sheet.set_text(0, 1, "Driver");
        sheet.set_text(1, 0, "{{no}}");
        sheet.set_text(1, 1, "{{driver}}");

        let json = r#"{
            "variables": {},
            "repeating_sections": {
                "detail": {"source": "trips", "sheet": "Rincian"}
            }
        }"#;
        let definitions = FormulaFile::parse(json).unwrap();
        let renderer = renderer_for(sheet, definitions);

        let doc = serde_json::json!({
            "trips": [
                {"no": 1, "driver": "Budi"},
                {"no": 2, "driver": "Sari"}
            ]
        });
        let ctx = RenderContext::from_json(&doc).unwrap();

        let (output, report) = renderer.render(&ctx).unwrap();
        assert_eq!(report.rows_expanded, 2);
        assert_eq!(
            output.sheet(0).unwrap().get_value(2, 1),
            CellValue::Text("Sari".to_string())
        );
    }
}
