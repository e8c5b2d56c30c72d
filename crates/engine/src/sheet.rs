use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellFormat, CellValue};

/// A merged cell region, inclusive on both ends (0-based coordinates)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MergedRegion {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

impl MergedRegion {
    pub fn new(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self {
            start: (start_row, start_col),
            end: (end_row, end_col),
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start.0 && row <= self.end.0 && col >= self.start.1 && col <= self.end.1
    }

    pub fn overlaps(&self, other: &MergedRegion) -> bool {
        self.start.0 <= other.end.0
            && other.start.0 <= self.end.0
            && self.start.1 <= other.end.1
            && other.start.1 <= self.end.1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    cells: HashMap<(usize, usize), Cell>,
    pub rows: usize,
    pub cols: usize,
    pub merged_regions: Vec<MergedRegion>,
    /// Column index → raw Excel character-width units
    pub col_widths: HashMap<usize, f64>,
    /// Row index → raw Excel point units
    pub row_heights: HashMap<usize, f64>,
}

impl Sheet {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::new_with_name(rows, cols, "Sheet1")
    }

    pub fn new_with_name(rows: usize, cols: usize, name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: HashMap::new(),
            rows,
            cols,
            merged_regions: Vec::new(),
            col_widths: HashMap::new(),
            row_heights: HashMap::new(),
        }
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: &str) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = CellValue::from_input(value);
    }

    /// Set a text value verbatim, without numeric coercion
    pub fn set_text(&mut self, row: usize, col: usize, text: &str) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = CellValue::Text(text.to_string());
    }

    pub fn set_number(&mut self, row: usize, col: usize, n: f64) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = CellValue::Number(n);
    }

    pub fn set_bool(&mut self, row: usize, col: usize, b: bool) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = CellValue::Bool(b);
    }

    pub fn clear_value(&mut self, row: usize, col: usize) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.value = CellValue::Empty;
        }
    }

    /// Get a clone of a cell (default empty cell if not found)
    pub fn get_cell(&self, row: usize, col: usize) -> Cell {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    pub fn get_cell_opt(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_value(&self, row: usize, col: usize) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn get_display(&self, row: usize, col: usize) -> String {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.display())
            .unwrap_or_default()
    }

    pub fn get_format(&self, row: usize, col: usize) -> CellFormat {
        self.cells
            .get(&(row, col))
            .map(|c| c.format.clone())
            .unwrap_or_default()
    }

    /// Replace a cell wholesale (value and format)
    pub fn set_cell(&mut self, row: usize, col: usize, cell: Cell) {
        self.cells.insert((row, col), cell);
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.format = format;
    }

    /// Iterate over all populated cells
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Bounding box of populated cells: (min_row, min_col, max_row, max_col).
    /// None if the sheet is empty.
    pub fn used_range(&self) -> Option<(usize, usize, usize, usize)> {
        let mut iter = self.cells.keys();
        let &(r0, c0) = iter.next()?;
        let mut bounds = (r0, c0, r0, c0);
        for &(r, c) in iter {
            bounds.0 = bounds.0.min(r);
            bounds.1 = bounds.1.min(c);
            bounds.2 = bounds.2.max(r);
            bounds.3 = bounds.3.max(c);
        }
        Some(bounds)
    }

    /// True if a cell sits inside a merged region but is not its origin
    pub fn is_merge_hidden(&self, row: usize, col: usize) -> bool {
        self.merged_regions
            .iter()
            .any(|m| m.contains(row, col) && m.start != (row, col))
    }

    /// Add a merged region, rejecting overlap with an existing one
    pub fn add_merge(&mut self, region: MergedRegion) -> Result<(), String> {
        if let Some(existing) = self.merged_regions.iter().find(|m| m.overlaps(&region)) {
            return Err(format!(
                "merge ({},{})..({},{}) overlaps existing ({},{})..({},{})",
                region.start.0, region.start.1, region.end.0, region.end.1,
                existing.start.0, existing.start.1, existing.end.0, existing.end.1
            ));
        }
        self.merged_regions.push(region);
        Ok(())
    }

    /// Insert rows at the specified position, shifting existing rows down.
    /// Cells, row heights, and merged regions at or below `at_row` all shift.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        if count == 0 {
            return;
        }

        let cells_to_shift: Vec<_> = self
            .cells
            .iter()
            .filter(|((r, _), _)| *r >= at_row)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            if r + count < self.rows {
                self.cells.insert((r + count, c), cell);
            }
        }

        // Shift row heights the same way
        let heights_to_shift: Vec<_> = self
            .row_heights
            .iter()
            .filter(|(r, _)| **r >= at_row)
            .map(|(r, h)| (*r, *h))
            .collect();
        for (r, _) in &heights_to_shift {
            self.row_heights.remove(r);
        }
        for (r, h) in heights_to_shift {
            self.row_heights.insert(r + count, h);
        }

        // Merged regions entirely at/below the insertion point move down;
        // regions straddling it grow so the merge still covers its rows.
        for merge in &mut self.merged_regions {
            if merge.start.0 >= at_row {
                merge.start.0 += count;
                merge.end.0 += count;
            } else if merge.end.0 >= at_row {
                merge.end.0 += count;
            }
        }
    }

    /// Delete rows at the specified position, shifting remaining rows up
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        if count == 0 {
            return;
        }

        self.cells
            .retain(|(r, _), _| *r < start_row || *r >= start_row + count);

        let cells_to_shift: Vec<_> = self
            .cells
            .iter()
            .filter(|((r, _), _)| *r >= start_row + count)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            self.cells.insert((r - count, c), cell);
        }

        self.row_heights
            .retain(|r, _| *r < start_row || *r >= start_row + count);
        let heights_to_shift: Vec<_> = self
            .row_heights
            .iter()
            .filter(|(r, _)| **r >= start_row + count)
            .map(|(r, h)| (*r, *h))
            .collect();
        for (r, _) in &heights_to_shift {
            self.row_heights.remove(r);
        }
        for (r, h) in heights_to_shift {
            self.row_heights.insert(r - count, h);
        }

        self.merged_regions
            .retain(|m| m.end.0 < start_row || m.start.0 >= start_row + count);
        for merge in &mut self.merged_regions {
            if merge.start.0 >= start_row + count {
                merge.start.0 -= count;
                merge.end.0 -= count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{BorderStyle, CellBorder};

    #[test]
    fn test_set_and_get_value() {
        let mut sheet = Sheet::new(100, 20);
        sheet.set_value(2, 3, "hello");
        assert_eq!(sheet.get_display(2, 3), "hello");
        assert_eq!(sheet.get_display(0, 0), "");
    }

    #[test]
    fn test_set_text_keeps_numeric_strings() {
        let mut sheet = Sheet::new(10, 10);
        sheet.set_text(0, 0, "007");
        assert_eq!(sheet.get_value(0, 0), CellValue::Text("007".to_string()));
    }

    #[test]
    fn test_format_persists_with_value() {
        let mut sheet = Sheet::new(10, 10);
        let mut format = CellFormat::default();
        format.bold = true;
        sheet.set_format(0, 0, format);
        sheet.set_value(0, 0, "Hello");
        assert!(sheet.get_format(0, 0).bold);
    }

    #[test]
    fn test_insert_rows_shifts_cells_down() {
        let mut sheet = Sheet::new(100, 10);
        sheet.set_value(5, 0, "template");
        sheet.set_value(6, 0, "below");

        sheet.insert_rows(6, 2);

        assert_eq!(sheet.get_display(5, 0), "template");
        assert_eq!(sheet.get_display(6, 0), "");
        assert_eq!(sheet.get_display(7, 0), "");
        assert_eq!(sheet.get_display(8, 0), "below");
    }

    #[test]
    fn test_insert_rows_shifts_formatting() {
        let mut sheet = Sheet::new(100, 10);
        let mut format = CellFormat::default();
        format.border_bottom = CellBorder { style: BorderStyle::Thin, color: None };
        sheet.set_value(4, 1, "x");
        sheet.set_format(4, 1, format.clone());

        sheet.insert_rows(3, 1);

        assert_eq!(sheet.get_format(5, 1), format);
        assert_eq!(sheet.get_format(4, 1), CellFormat::default());
    }

    #[test]
    fn test_insert_rows_shifts_row_heights_and_merges() {
        let mut sheet = Sheet::new(100, 10);
        sheet.row_heights.insert(6, 30.0);
        sheet.add_merge(MergedRegion::new(6, 0, 6, 3)).unwrap();
        sheet.add_merge(MergedRegion::new(1, 0, 1, 3)).unwrap();

        sheet.insert_rows(4, 3);

        assert_eq!(sheet.row_heights.get(&9), Some(&30.0));
        assert!(sheet.row_heights.get(&6).is_none());
        assert!(sheet.merged_regions.contains(&MergedRegion::new(9, 0, 9, 3)));
        // Merge above the insertion point is untouched
        assert!(sheet.merged_regions.contains(&MergedRegion::new(1, 0, 1, 3)));
    }

    #[test]
    fn test_straddling_merge_grows_on_insert() {
        let mut sheet = Sheet::new(100, 10);
        sheet.add_merge(MergedRegion::new(2, 0, 5, 0)).unwrap();

        sheet.insert_rows(4, 2);

        assert_eq!(sheet.merged_regions[0], MergedRegion::new(2, 0, 7, 0));
    }

    #[test]
    fn test_add_merge_rejects_overlap() {
        let mut sheet = Sheet::new(10, 10);
        sheet.add_merge(MergedRegion::new(0, 0, 1, 1)).unwrap();
        assert!(sheet.add_merge(MergedRegion::new(1, 1, 2, 2)).is_err());
        assert!(sheet.add_merge(MergedRegion::new(2, 2, 3, 3)).is_ok());
    }

    #[test]
    fn test_merge_hidden_cells() {
        let mut sheet = Sheet::new(10, 10);
        sheet.add_merge(MergedRegion::new(0, 0, 0, 2)).unwrap();
        assert!(!sheet.is_merge_hidden(0, 0));
        assert!(sheet.is_merge_hidden(0, 1));
        assert!(sheet.is_merge_hidden(0, 2));
        assert!(!sheet.is_merge_hidden(1, 0));
    }

    #[test]
    fn test_used_range() {
        let mut sheet = Sheet::new(100, 100);
        assert!(sheet.used_range().is_none());
        sheet.set_value(3, 2, "a");
        sheet.set_value(7, 5, "b");
        assert_eq!(sheet.used_range(), Some((3, 2, 7, 5)));
    }

    #[test]
    fn test_delete_rows() {
        let mut sheet = Sheet::new(100, 10);
        sheet.set_value(2, 0, "keep");
        sheet.set_value(3, 0, "gone");
        sheet.set_value(4, 0, "shifted");

        sheet.delete_rows(3, 1);

        assert_eq!(sheet.get_display(2, 0), "keep");
        assert_eq!(sheet.get_display(3, 0), "shifted");
        assert_eq!(sheet.get_display(4, 0), "");
    }
}
