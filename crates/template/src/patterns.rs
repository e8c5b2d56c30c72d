//! Pattern detector: classifies scanned rows into repeating template rows
//! and header+template "dynamic tables".

use lapor_engine::sheet::Sheet;

use crate::scanner::ScanResult;

/// Minimum placeholder count for a row to qualify as a repeating
/// template row on its own (without a header above it).
pub const TEMPLATE_ROW_MIN_PLACEHOLDERS: usize = 3;

/// Minimum populated header cells for a header+template pair.
const HEADER_MIN_COLUMNS: usize = 2;

/// A detected structural unit in a sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// A row with enough placeholders to be repeated per record.
    TemplateRow {
        row: usize,
        start_col: usize,
        end_col: usize,
        columns: Vec<usize>,
    },
    /// A header row plus the placeholder row right below it.
    DynamicTable {
        header_row: usize,
        template_row: usize,
        headers: Vec<String>,
        columns: Vec<usize>,
    },
}

impl Pattern {
    /// The row that gets duplicated per data record.
    pub fn template_row(&self) -> usize {
        match self {
            Pattern::TemplateRow { row, .. } => *row,
            Pattern::DynamicTable { template_row, .. } => *template_row,
        }
    }

    /// Columns participating in the pattern.
    pub fn columns(&self) -> &[usize] {
        match self {
            Pattern::TemplateRow { columns, .. } => columns,
            Pattern::DynamicTable { columns, .. } => columns,
        }
    }

    pub fn headers(&self) -> &[String] {
        match self {
            Pattern::TemplateRow { .. } => &[],
            Pattern::DynamicTable { headers, .. } => headers,
        }
    }
}

/// Detect repeating patterns in a scanned sheet.
///
/// Dynamic tables (header row followed by a placeholder row) take
/// precedence: a row claimed as a table's template row is not also emitted
/// as a freestanding template-row pattern. Detection never fails; rows
/// matching no heuristic are simply omitted.
pub fn detect_patterns(sheet: &Sheet, scan: &ScanResult) -> Vec<Pattern> {
    let by_row = scan.by_row();
    let mut patterns: Vec<Pattern> = Vec::new();
    let mut table_rows: Vec<usize> = Vec::new();

    let mut placeholder_rows: Vec<usize> = by_row.keys().copied().collect();
    placeholder_rows.sort_unstable();

    // Pass 1: header+template pairs. The row above a placeholder row is a
    // candidate header when it carries plain text (no placeholders of its
    // own) across at least HEADER_MIN_COLUMNS cells.
    for &row in &placeholder_rows {
        if row == 0 || by_row.contains_key(&(row - 1)) {
            continue;
        }
        let header_row = row - 1;
        let header_cells = text_cells_in_row(sheet, header_row);
        if header_cells.len() < HEADER_MIN_COLUMNS {
            continue;
        }

        let columns: Vec<usize> = header_cells.iter().map(|(col, _)| *col).collect();
        let headers: Vec<String> = header_cells.into_iter().map(|(_, text)| text).collect();

        patterns.push(Pattern::DynamicTable {
            header_row,
            template_row: row,
            headers,
            columns,
        });
        table_rows.push(row);
    }

    // Pass 2: freestanding template rows (≥ 3 placeholders), skipping rows
    // already claimed by a table.
    for &row in &placeholder_rows {
        if table_rows.contains(&row) {
            continue;
        }
        let occupied = &by_row[&row];
        if occupied.len() < TEMPLATE_ROW_MIN_PLACEHOLDERS {
            continue;
        }

        let mut columns: Vec<usize> = occupied.iter().map(|(col, _)| *col).collect();
        columns.sort_unstable();
        columns.dedup();

        patterns.push(Pattern::TemplateRow {
            row,
            start_col: columns[0],
            end_col: columns[columns.len() - 1],
            columns,
        });
    }

    patterns.sort_by_key(|p| p.template_row());
    patterns
}

/// Non-empty text cells in a row: (col, text), sorted by column.
fn text_cells_in_row(sheet: &Sheet, row: usize) -> Vec<(usize, String)> {
    let mut cells: Vec<(usize, String)> = sheet
        .cells_iter()
        .filter(|(&(r, _), cell)| r == row && !cell.value.is_empty())
        .filter_map(|(&(_, c), cell)| {
            cell.value.as_text().map(|t| (c, t.to_string()))
        })
        .filter(|(_, t)| !t.trim().is_empty())
        .collect();
    cells.sort_unstable_by_key(|(col, _)| *col);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn sheet_with(cells: &[(usize, usize, &str)]) -> Sheet {
        let mut sheet = Sheet::new_with_name(100, 20, "Test");
        for &(row, col, text) in cells {
            sheet.set_text(row, col, text);
        }
        sheet
    }

    #[test]
    fn test_detect_template_row() {
        let sheet = sheet_with(&[
            (3, 0, "{{no}}"),
            (3, 1, "{{date}}"),
            (3, 2, "{{qty}}"),
        ]);
        let patterns = detect_patterns(&sheet, &scan(&sheet));
        assert_eq!(patterns.len(), 1);
        match &patterns[0] {
            Pattern::TemplateRow {
                row,
                start_col,
                end_col,
                columns,
            } => {
                assert_eq!(*row, 3);
                assert_eq!(*start_col, 0);
                assert_eq!(*end_col, 2);
                assert_eq!(columns, &vec![0, 1, 2]);
            }
            other => panic!("expected TemplateRow, got {:?}", other),
        }
    }

    #[test]
    fn test_two_placeholders_is_not_a_template_row() {
        let sheet = sheet_with(&[(3, 0, "{{a}}"), (3, 1, "{{b}}")]);
        assert!(detect_patterns(&sheet, &scan(&sheet)).is_empty());
    }

    #[test]
    fn test_detect_dynamic_table() {
        let sheet = sheet_with(&[
            (5, 0, "Date"),
            (5, 1, "Qty"),
            (6, 0, "{{d}}"),
            (6, 1, "{{q}}"),
        ]);
        let patterns = detect_patterns(&sheet, &scan(&sheet));
        assert_eq!(patterns.len(), 1);
        match &patterns[0] {
            Pattern::DynamicTable {
                header_row,
                template_row,
                headers,
                columns,
            } => {
                assert_eq!(*header_row, 5);
                assert_eq!(*template_row, 6);
                assert_eq!(headers, &vec!["Date".to_string(), "Qty".to_string()]);
                assert_eq!(columns, &vec![0, 1]);
            }
            other => panic!("expected DynamicTable, got {:?}", other),
        }
    }

    #[test]
    fn test_table_takes_precedence_over_template_row() {
        // Three placeholders under a header row: one table, no freestanding
        // template-row pattern for the same row
        let sheet = sheet_with(&[
            (5, 0, "No"),
            (5, 1, "Date"),
            (5, 2, "Qty"),
            (6, 0, "{{no}}"),
            (6, 1, "{{d}}"),
            (6, 2, "{{q}}"),
        ]);
        let patterns = detect_patterns(&sheet, &scan(&sheet));
        assert_eq!(patterns.len(), 1);
        assert!(matches!(patterns[0], Pattern::DynamicTable { .. }));
    }

    #[test]
    fn test_consecutive_placeholder_rows_are_not_tables() {
        // Row above the template row holds placeholders itself, so it is
        // not a header
        let sheet = sheet_with(&[
            (4, 0, "{{a}}"),
            (4, 1, "{{b}}"),
            (4, 2, "{{c}}"),
            (5, 0, "{{x}}"),
            (5, 1, "{{y}}"),
            (5, 2, "{{z}}"),
        ]);
        let patterns = detect_patterns(&sheet, &scan(&sheet));
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().all(|p| matches!(p, Pattern::TemplateRow { .. })));
    }

    #[test]
    fn test_singleton_placeholders_are_omitted() {
        let sheet = sheet_with(&[(0, 0, "Estate: {{estate_name}}")]);
        assert!(detect_patterns(&sheet, &scan(&sheet)).is_empty());
    }
}
