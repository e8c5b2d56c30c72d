//! Row expansion: duplicates a detected template row once per data record
//! and binds each row's placeholders from the matching record.

use lapor_engine::cell::{Cell, CellFormat};
use lapor_engine::sheet::Sheet;

use crate::patterns::Pattern;
use crate::resolver;
use crate::scanner::{self, ScanResult};
use crate::value::{Record, RenderContext, Scalar};

/// One template-row cell captured before expansion.
struct TemplateCell {
    col: usize,
    text: Option<String>,
    snapshot: Cell,
    format: CellFormat,
    names: Vec<String>,
}

/// Expand a pattern in place: insert one row per record below the
/// template row, copy the template row's formatting onto each, and bind
/// placeholders record-first with the context as fallback.
///
/// Zero records leaves the sheet untouched and reports a warning.
/// Returns the number of data rows written plus any warnings.
pub fn expand(
    sheet: &mut Sheet,
    pattern: &Pattern,
    records: &[Record],
    ctx: &RenderContext,
    scan: &ScanResult,
) -> (usize, Vec<String>) {
    let mut warnings = Vec::new();
    let template_row = pattern.template_row();

    if records.is_empty() {
        warnings.push(format!(
            "sheet '{}': no records for template row {}, left unexpanded",
            sheet.name,
            template_row + 1
        ));
        return (0, warnings);
    }

    let template = capture_template_row(sheet, template_row, scan);

    // Make room below the template row; the template row itself becomes
    // the first data row
    if records.len() > 1 {
        sheet.insert_rows(template_row + 1, records.len() - 1);
    }

    let mut missing: Vec<String> = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let target_row = template_row + i;
        for cell in &template {
            sheet.set_format(target_row, cell.col, cell.format.clone());

            if cell.names.is_empty() {
                // Static cell: repeat verbatim on every data row
                if i > 0 {
                    sheet.set_cell(target_row, cell.col, cell.snapshot.clone());
                }
                continue;
            }

            let text = match &cell.text {
                Some(t) => t,
                None => continue,
            };

            if cell.names.len() == 1 && scanner::is_sole_token(text, &cell.names[0]) {
                let value = bind(&cell.names[0], record, ctx, &mut missing);
                write_scalar(sheet, target_row, cell.col, &value);
            } else {
                let mut rendered = text.clone();
                for name in &cell.names {
                    let value = bind(name, record, ctx, &mut missing);
                    rendered = scanner::substitute(&rendered, name, &value.display());
                }
                sheet.set_text(target_row, cell.col, &rendered);
            }
        }
    }

    for name in missing {
        warnings.push(format!(
            "sheet '{}': no value for '{}' in records or context",
            sheet.name, name
        ));
    }

    (records.len(), warnings)
}

/// Record-first binding: the current record wins over the global context.
/// Unresolvable names bind to Empty and are reported once.
fn bind(name: &str, record: &Record, ctx: &RenderContext, missing: &mut Vec<String>) -> Scalar {
    if let Some(value) = resolver::lookup_in_record(name, record) {
        return value;
    }
    if let Some(value) = resolver::lookup(name, ctx) {
        return value;
    }
    if !missing.iter().any(|m| m == name) {
        missing.push(name.to_string());
    }
    Scalar::Empty
}

/// Write a bound value with its native cell type. Dates render as
/// report-style text rather than serial numbers.
fn write_scalar(sheet: &mut Sheet, row: usize, col: usize, value: &Scalar) {
    match value {
        Scalar::Empty => sheet.clear_value(row, col),
        Scalar::Number(n) => sheet.set_number(row, col, *n),
        Scalar::Bool(b) => sheet.set_bool(row, col, *b),
        other => sheet.set_text(row, col, &other.display()),
    }
}

/// Snapshot every populated cell in the template row, with the
/// placeholder names each carries.
fn capture_template_row(sheet: &Sheet, row: usize, scan: &ScanResult) -> Vec<TemplateCell> {
    let mut cells: Vec<TemplateCell> = sheet
        .cells_iter()
        .filter(|(&(r, _), _)| r == row)
        .map(|(&(_, col), cell)| TemplateCell {
            col,
            text: cell.value.as_text().map(|t| t.to_string()),
            snapshot: cell.clone(),
            format: cell.format.clone(),
            names: scan
                .names_at(row, col)
                .into_iter()
                .map(|n| n.to_string())
                .collect(),
        })
        .collect();
    cells.sort_unstable_by_key(|c| c.col);
    cells
}
