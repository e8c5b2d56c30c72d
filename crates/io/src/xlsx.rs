// Excel file import (xlsx, xls, xlsb, ods) and export (xlsx only)
//
// Import: one-way conversion into the internal workbook model, preserving
//         cell text verbatim so placeholder tokens survive untouched.
// Export: writes the rendered workbook with formatting, merges and layout.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{
    Format, FormatAlign, FormatBorder, FormatUnderline, Workbook as XlsxWorkbook, Worksheet,
};

use lapor_engine::cell::{
    Alignment, BorderStyle, CellFormat, CellValue, DateStyle, NumberFormat, VerticalAlignment,
};
use lapor_engine::sheet::{MergedRegion, Sheet};
use lapor_engine::workbook::Workbook;

use crate::xlsx_styles;

// =============================================================================
// Import result
// =============================================================================

/// Per-sheet import statistics
#[derive(Debug, Default, Clone)]
pub struct SheetStats {
    pub name: String,
    pub cells_imported: usize,
    pub dates_imported: usize,
    pub truncated_rows: usize,
    pub truncated_cols: usize,
}

/// Result of an Excel import operation
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Per-sheet statistics
    pub sheet_stats: Vec<SheetStats>,
    /// Count of sheets imported
    pub sheets_imported: usize,
    /// Total cells imported
    pub cells_imported: usize,
    /// Total date/time cells imported
    pub dates_imported: usize,
    /// Whether any truncation occurred
    pub truncated: bool,
    /// Actionable warnings (not boilerplate)
    pub warnings: Vec<String>,
    /// Number of cells that received formatting from styles.xml
    pub styles_applied: usize,
    /// Number of unique styles in the style table
    pub unique_styles: usize,
    /// Total merged cell regions imported
    pub merges_imported: usize,
    /// Merged regions dropped (overlap or invalid refs)
    pub merges_dropped: usize,
    /// Unsupported formatting features encountered during import
    pub unsupported_format_features: Vec<String>,
    /// Total import duration in milliseconds
    pub import_duration_ms: u128,
}

impl ImportResult {
    /// Returns a summary message suitable for display
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!(
                "{} sheet{}",
                self.sheets_imported,
                if self.sheets_imported == 1 { "" } else { "s" }
            ),
            format!("{} cells", self.cells_imported),
        ];
        if self.styles_applied > 0 {
            parts.push(format!(
                "Formatting: {} cells ({} styles)",
                self.styles_applied, self.unique_styles
            ));
        }
        if self.merges_imported > 0 {
            if self.merges_dropped > 0 {
                parts.push(format!(
                    "{} merged regions ({} dropped)",
                    self.merges_imported, self.merges_dropped
                ));
            } else {
                parts.push(format!("{} merged regions", self.merges_imported));
            }
        }
        parts.join(" · ")
    }

    /// Returns true if there are actionable warnings
    pub fn has_warnings(&self) -> bool {
        self.truncated || self.merges_dropped > 0 || !self.warnings.is_empty()
    }

    /// Returns a single-line warning summary (only actionable issues)
    pub fn warning_summary(&self) -> Option<String> {
        let mut issues = Vec::new();

        if self.truncated {
            issues.push("data truncated".to_string());
        }
        if self.merges_dropped > 0 {
            issues.push(format!("{} merged regions dropped", self.merges_dropped));
        }

        if issues.is_empty() {
            if self.warnings.is_empty() {
                None
            } else {
                Some(format!("Import issues: {}", self.warnings.join(", ")))
            }
        } else {
            Some(format!("Import issues: {}", issues.join(", ")))
        }
    }
}

// =============================================================================
// Import
// =============================================================================

/// Maximum total cells across all sheets
const MAX_CELLS: usize = 5_000_000;

/// Maximum dimensions for a sheet
const MAX_ROWS: usize = 65536;
const MAX_COLS: usize = 256;

/// Import an Excel file (xlsx, xls, xlsb, ods)
pub fn import(path: &Path) -> Result<(Workbook, ImportResult), String> {
    let start_time = Instant::now();

    let mut source: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let mut result = ImportResult::default();
    let mut sheets: Vec<Sheet> = Vec::new();
    let sheet_names: Vec<String> = source.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err("Excel file contains no sheets".to_string());
    }

    let mut total_cells = 0;
    let mut hit_cell_limit = false;

    for sheet_name in &sheet_names {
        let range = source
            .worksheet_range(sheet_name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

        let (height, width) = range.get_size();

        let mut stats = SheetStats {
            name: sheet_name.clone(),
            ..Default::default()
        };

        // Empty sheets are still created so sheet indices line up
        if height == 0 || width == 0 {
            sheets.push(Sheet::new_with_name(MAX_ROWS, MAX_COLS, sheet_name));
            result.sheets_imported += 1;
            result.sheet_stats.push(stats);
            continue;
        }

        let effective_rows = height.min(MAX_ROWS);
        let effective_cols = width.min(MAX_COLS);

        if height > MAX_ROWS || width > MAX_COLS {
            stats.truncated_rows = height.saturating_sub(MAX_ROWS);
            stats.truncated_cols = width.saturating_sub(MAX_COLS);
            result.truncated = true;
            result.warnings.push(format!(
                "Sheet '{}' truncated from {}x{} to {}x{}",
                sheet_name, height, width, effective_rows, effective_cols
            ));
        }

        let mut sheet = Sheet::new_with_name(MAX_ROWS, MAX_COLS, sheet_name);

        // Range start offset (data may not begin at A1)
        let (data_start_row, data_start_col) = range.start().unwrap_or((0, 0));

        'rows: for (row_idx, row) in range.rows().enumerate() {
            let target_row = data_start_row as usize + row_idx;
            if target_row >= effective_rows {
                break;
            }

            for (col_idx, cell) in row.iter().enumerate() {
                let target_col = data_start_col as usize + col_idx;
                if target_col >= effective_cols {
                    break;
                }

                if total_cells >= MAX_CELLS {
                    if !hit_cell_limit {
                        hit_cell_limit = true;
                        result.truncated = true;
                        result.warnings.push(format!(
                            "Import stopped at {} cells (limit reached)",
                            MAX_CELLS
                        ));
                    }
                    break 'rows;
                }

                match cell {
                    Data::Empty => {}
                    Data::String(s) => {
                        // Verbatim: placeholder tokens like {{estate_name}}
                        // must survive exactly as typed
                        if !s.is_empty() {
                            sheet.set_text(target_row, target_col, s);
                            stats.cells_imported += 1;
                            total_cells += 1;
                        }
                    }
                    Data::Float(n) => {
                        sheet.set_number(target_row, target_col, *n);
                        stats.cells_imported += 1;
                        total_cells += 1;
                    }
                    Data::Int(n) => {
                        sheet.set_number(target_row, target_col, *n as f64);
                        stats.cells_imported += 1;
                        total_cells += 1;
                    }
                    Data::Bool(b) => {
                        sheet.set_bool(target_row, target_col, *b);
                        stats.cells_imported += 1;
                        total_cells += 1;
                    }
                    Data::Error(e) => {
                        sheet.set_text(target_row, target_col, &format!("#{:?}", e));
                        stats.cells_imported += 1;
                        total_cells += 1;
                    }
                    Data::DateTime(dt) => {
                        // Store the Excel serial; the number format carries
                        // the date/time category for display and export
                        let serial = dt.as_f64();
                        sheet.set_number(target_row, target_col, serial);

                        let has_date = serial.floor() > 0.0;
                        let has_time = serial.fract().abs() > 0.0001;

                        let mut format = sheet.get_format(target_row, target_col);
                        format.number_format = if has_date && has_time {
                            NumberFormat::DateTime
                        } else if has_time {
                            NumberFormat::Time
                        } else {
                            NumberFormat::Date {
                                style: DateStyle::Short,
                            }
                        };
                        sheet.set_format(target_row, target_col, format);

                        stats.dates_imported += 1;
                        stats.cells_imported += 1;
                        total_cells += 1;
                    }
                    Data::DateTimeIso(s) | Data::DurationIso(s) => {
                        sheet.set_text(target_row, target_col, s);
                        stats.cells_imported += 1;
                        total_cells += 1;
                    }
                }
            }
        }

        result.cells_imported += stats.cells_imported;
        result.dates_imported += stats.dates_imported;
        result.sheets_imported += 1;
        result.sheet_stats.push(stats);
        sheets.push(sheet);
    }

    let mut workbook = Workbook::from_sheets(sheets, 0);

    // Layer formatting from the raw XLSX XML on top of calamine's values.
    // Only .xlsx files carry styles.xml; other formats skip gracefully.
    import_formatting(path, &sheet_names, &mut workbook, &mut result);

    result.import_duration_ms = start_time.elapsed().as_millis();
    Ok((workbook, result))
}

/// Apply formatting parsed from the XLSX ZIP onto the imported workbook.
fn import_formatting(
    path: &Path,
    sheet_names: &[String],
    workbook: &mut Workbook,
    result: &mut ImportResult,
) {
    let (style_table, sheet_formats, stats) =
        match xlsx_styles::parse_xlsx_formatting(path, sheet_names) {
            Ok(data) => data,
            Err(_) => return, // Graceful fallback: no formatting
        };

    if style_table.is_empty() {
        return;
    }

    result.unique_styles = stats.unique_styles;

    for (sheet_idx, sheet_fmt) in sheet_formats.iter().enumerate() {
        let sheet = match workbook.sheet_mut(sheet_idx) {
            Some(s) => s,
            None => continue,
        };

        for &(row, col, style_id) in &sheet_fmt.cell_styles {
            let format = match style_table.get(style_id) {
                Some(f) => f,
                None => continue,
            };
            if *format == CellFormat::default() {
                continue;
            }

            let cell_exists = !sheet.get_value(row, col).is_empty();

            // Styled-empty cells only materialize when visibly formatted;
            // row expansion needs their borders and fills copied too
            if cell_exists || format.is_visually_relevant() {
                let mut merged = format.clone();
                // Keep a date/time category already detected by calamine
                let existing = sheet.get_format(row, col);
                if merged.number_format == NumberFormat::General
                    && existing.number_format != NumberFormat::General
                {
                    merged.number_format = existing.number_format;
                }
                sheet.set_format(row, col, merged);
                result.styles_applied += 1;
            }
        }

        // Layout goes straight onto the sheet in raw Excel units
        sheet.col_widths.extend(sheet_fmt.col_widths.iter());
        sheet.row_heights.extend(sheet_fmt.row_heights.iter());

        for &(sr, sc, er, ec) in &sheet_fmt.merged_regions {
            if sr > er || sc > ec {
                result.merges_dropped += 1;
                continue;
            }
            match sheet.add_merge(MergedRegion::new(sr, sc, er, ec)) {
                Ok(()) => result.merges_imported += 1,
                Err(msg) => {
                    result.merges_dropped += 1;
                    result
                        .unsupported_format_features
                        .push(format!("dropped merge: {}", msg));
                }
            }
        }
    }

    result
        .unsupported_format_features
        .extend(stats.unsupported_features);

    for feature in &result.unsupported_format_features {
        result
            .warnings
            .push(format!("Unsupported formatting: {}", feature));
    }
}

// =============================================================================
// Export
// =============================================================================

/// Result of an XLSX export operation
#[derive(Debug, Default)]
pub struct ExportResult {
    /// Number of sheets exported
    pub sheets_exported: usize,
    /// Total cells exported
    pub cells_exported: usize,
    /// Total merged cell regions exported
    pub merges_exported: usize,
    /// Warnings generated during export
    pub warnings: Vec<String>,
    /// Export duration in milliseconds
    pub export_duration_ms: u128,
}

impl ExportResult {
    /// Returns a summary message suitable for display
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!(
                "{} sheet{}",
                self.sheets_exported,
                if self.sheets_exported == 1 { "" } else { "s" }
            ),
            format!("{} cells", self.cells_exported),
        ];
        if self.merges_exported > 0 {
            parts.push(format!("{} merged regions", self.merges_exported));
        }
        parts.join(", ")
    }

    /// Returns true if there are warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns a single-line warning summary
    pub fn warning_summary(&self) -> Option<String> {
        if self.warnings.is_empty() {
            None
        } else {
            Some(self.warnings.join(", "))
        }
    }
}

/// Export a workbook to an XLSX file.
pub fn export(workbook: &Workbook, path: &Path) -> Result<ExportResult, String> {
    let start_time = Instant::now();
    let mut result = ExportResult::default();

    let mut xlsx_workbook = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        // Export merged cell regions first — merge_range() writes blanks to
        // all cells in the range, then export_sheet_cells() overwrites the
        // origin cell with the correct typed value.
        let merge_format = Format::new();
        for merge in &sheet.merged_regions {
            worksheet
                .merge_range(
                    merge.start.0 as u32,
                    merge.start.1 as u16,
                    merge.end.0 as u32,
                    merge.end.1 as u16,
                    "",
                    &merge_format,
                )
                .map_err(|e| format!("Failed to write merge: {}", e))?;
            result.merges_exported += 1;
        }

        result.cells_exported += export_sheet_cells(sheet, worksheet)?;

        // Column widths and row heights are stored in raw Excel units
        for (col, width) in &sheet.col_widths {
            worksheet
                .set_column_width(*col as u16, *width)
                .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
        }
        for (row, height) in &sheet.row_heights {
            worksheet
                .set_row_height(*row as u32, *height)
                .map_err(|e| format!("Failed to set row {} height: {}", row, e))?;
        }

        result.sheets_exported += 1;
    }

    if let Ok(ws) = xlsx_workbook.worksheet_from_index(workbook.active_sheet_index()) {
        let _ = ws.set_active(true);
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;

    result.export_duration_ms = start_time.elapsed().as_millis();
    Ok(result)
}

/// Write all cells of one sheet. Returns the number of cells exported.
fn export_sheet_cells(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<usize, String> {
    let mut cells_exported = 0;

    for ((row, col), cell) in sheet.cells_iter() {
        // Merge-hidden cells: only the origin cell exports its value
        if sheet.is_merge_hidden(*row, *col) {
            continue;
        }

        let row32 = *row as u32;
        let col16 = *col as u16;

        let format = build_excel_format(&cell.format);

        match &cell.value {
            CellValue::Empty => {
                // Only write format if the cell has visible formatting
                if has_formatting(&cell.format) {
                    worksheet
                        .write_blank(row32, col16, &format)
                        .map_err(|e| format!("Failed to write cell {}: {}", cell_address(*row, *col), e))?;
                    cells_exported += 1;
                }
            }
            CellValue::Text(s) => {
                worksheet
                    .write_string_with_format(row32, col16, s, &format)
                    .map_err(|e| format!("Failed to write cell {}: {}", cell_address(*row, *col), e))?;
                cells_exported += 1;
            }
            CellValue::Number(n) => {
                let format = apply_number_format(format, &cell.format.number_format);
                worksheet
                    .write_number_with_format(row32, col16, *n, &format)
                    .map_err(|e| format!("Failed to write cell {}: {}", cell_address(*row, *col), e))?;
                cells_exported += 1;
            }
            CellValue::Bool(b) => {
                worksheet
                    .write_boolean_with_format(row32, col16, *b, &format)
                    .map_err(|e| format!("Failed to write cell {}: {}", cell_address(*row, *col), e))?;
                cells_exported += 1;
            }
        }
    }

    Ok(cells_exported)
}

// =============================================================================
// Format conversion
// =============================================================================

/// Convert column index to Excel column letters (0 = A, 25 = Z, 26 = AA)
fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Cell address like "B5" from 0-based (row, col)
fn cell_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col), row + 1)
}

/// Build a rust_xlsxwriter Format from a CellFormat
fn build_excel_format(cell_format: &CellFormat) -> Format {
    let mut format = Format::new();

    if cell_format.bold {
        format = format.set_bold();
    }
    if cell_format.italic {
        format = format.set_italic();
    }
    if cell_format.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if cell_format.strikethrough {
        format = format.set_font_strikethrough();
    }

    if let Some(size) = cell_format.font_size {
        format = format.set_font_size(size as f64);
    }

    if let Some([r, g, b, _]) = cell_format.font_color {
        format = format.set_font_color(rgb_color(r, g, b));
    }

    if let Some(ref family) = cell_format.font_family {
        format = format.set_font_name(family);
    }

    format = match cell_format.alignment {
        Alignment::General => format, // Excel default: numbers right, text left
        Alignment::Left => format.set_align(FormatAlign::Left),
        Alignment::Center => format.set_align(FormatAlign::Center),
        Alignment::Right => format.set_align(FormatAlign::Right),
    };

    format = match cell_format.vertical_alignment {
        VerticalAlignment::Top => format.set_align(FormatAlign::Top),
        VerticalAlignment::Middle => format.set_align(FormatAlign::VerticalCenter),
        VerticalAlignment::Bottom => format.set_align(FormatAlign::Bottom),
    };

    if cell_format.wrap_text {
        format = format.set_text_wrap();
    }

    if let Some([r, g, b, _]) = cell_format.fill_color {
        format = format.set_background_color(rgb_color(r, g, b));
    }

    if !cell_format.border_top.is_none() {
        format = format.set_border_top(border_style_to_xlsx(cell_format.border_top.style));
    }
    if !cell_format.border_right.is_none() {
        format = format.set_border_right(border_style_to_xlsx(cell_format.border_right.style));
    }
    if !cell_format.border_bottom.is_none() {
        format = format.set_border_bottom(border_style_to_xlsx(cell_format.border_bottom.style));
    }
    if !cell_format.border_left.is_none() {
        format = format.set_border_left(border_style_to_xlsx(cell_format.border_left.style));
    }

    format
}

fn rgb_color(r: u8, g: u8, b: u8) -> rust_xlsxwriter::Color {
    rust_xlsxwriter::Color::RGB(((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
}

/// Convert BorderStyle to rust_xlsxwriter FormatBorder
fn border_style_to_xlsx(style: BorderStyle) -> FormatBorder {
    match style {
        BorderStyle::None => FormatBorder::None,
        BorderStyle::Thin => FormatBorder::Thin,
        BorderStyle::Medium => FormatBorder::Medium,
        BorderStyle::Thick => FormatBorder::Thick,
        BorderStyle::Dashed => FormatBorder::Dashed,
        BorderStyle::Dotted => FormatBorder::Dotted,
        BorderStyle::Double => FormatBorder::Double,
        BorderStyle::Hair => FormatBorder::Hair,
    }
}

/// Build the numeric pattern portion of a format code, e.g. `#,##0.00`
fn build_number_pattern(decimals: u8) -> String {
    if decimals == 0 {
        "#,##0".to_string()
    } else {
        format!("#,##0.{}", "0".repeat(decimals as usize))
    }
}

/// Apply number format to an Excel Format
fn apply_number_format(format: Format, number_format: &NumberFormat) -> Format {
    match number_format {
        NumberFormat::General => format,
        NumberFormat::Number { decimals } => {
            format.set_num_format(&build_number_pattern(*decimals))
        }
        NumberFormat::Currency { decimals } => {
            format.set_num_format(&format!("${}", build_number_pattern(*decimals)))
        }
        NumberFormat::Percent { decimals } => {
            let pattern = if *decimals == 0 {
                "0%".to_string()
            } else {
                format!("0.{}%", "0".repeat(*decimals as usize))
            };
            format.set_num_format(&pattern)
        }
        NumberFormat::Date { style } => {
            let pattern = match style {
                DateStyle::Short => "dd/mm/yyyy",
                DateStyle::Long => "dd mmmm yyyy",
            };
            format.set_num_format(pattern)
        }
        NumberFormat::Time => format.set_num_format("h:mm:ss"),
        NumberFormat::DateTime => format.set_num_format("dd/mm/yyyy h:mm:ss"),
        NumberFormat::Text => format.set_num_format("@"),
    }
}

/// Check if a CellFormat has any non-default formatting
fn has_formatting(format: &CellFormat) -> bool {
    format.is_visually_relevant()
        || format.alignment != Alignment::General
        || format.vertical_alignment != VerticalAlignment::Bottom
        || format.number_format != NumberFormat::General
        || format.font_family.is_some()
        || format.font_size.is_some()
        || format.wrap_text
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lapor_engine::cell::CellBorder;

    #[test]
    fn test_col_to_letter() {
        assert_eq!(col_to_letter(0), "A");
        assert_eq!(col_to_letter(25), "Z");
        assert_eq!(col_to_letter(26), "AA");
        assert_eq!(col_to_letter(51), "AZ");
        assert_eq!(col_to_letter(52), "BA");
    }

    #[test]
    fn test_cell_address() {
        assert_eq!(cell_address(0, 0), "A1");
        assert_eq!(cell_address(4, 1), "B5");
    }

    #[test]
    fn test_build_number_pattern() {
        assert_eq!(build_number_pattern(0), "#,##0");
        assert_eq!(build_number_pattern(2), "#,##0.00");
    }

    #[test]
    fn test_has_formatting() {
        assert!(!has_formatting(&CellFormat::default()));

        let mut bordered = CellFormat::default();
        bordered.border_bottom = CellBorder {
            style: BorderStyle::Thin,
            color: None,
        };
        assert!(has_formatting(&bordered));

        let mut dated = CellFormat::default();
        dated.number_format = NumberFormat::Date {
            style: DateStyle::Long,
        };
        assert!(has_formatting(&dated));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.xlsx");

        let mut sheet = Sheet::new_with_name(100, 20, "Laporan");
        sheet.set_text(0, 0, "Estate: {{estate_name}}");
        sheet.set_number(1, 0, 1250.5);
        sheet.set_bool(2, 0, true);
        sheet
            .add_merge(MergedRegion::new(0, 0, 0, 2))
            .unwrap();
        let workbook = Workbook::from_sheets(vec![sheet], 0);

        let export_result = export(&workbook, &path).unwrap();
        assert_eq!(export_result.sheets_exported, 1);
        assert_eq!(export_result.merges_exported, 1);

        let (imported, import_result) = import(&path).unwrap();
        assert_eq!(import_result.sheets_imported, 1);
        let sheet = imported.sheet_by_name("Laporan").unwrap();
        assert_eq!(
            sheet.get_value(0, 0),
            CellValue::Text("Estate: {{estate_name}}".to_string())
        );
        assert_eq!(sheet.get_value(1, 0), CellValue::Number(1250.5));
        assert_eq!(import_result.merges_imported, 1);
    }
}
