use serde::{Deserialize, Serialize};

use super::sheet::Sheet;

/// An ordered collection of sheets.
///
/// Loaded templates are held read-only; rendering works on a `deep_copy()`
/// so the source workbook is never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new(65536, 256)],
            active_sheet: 0,
        }
    }

    pub fn from_sheets(sheets: Vec<Sheet>, active_sheet: usize) -> Self {
        Self { sheets, active_sheet }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheets_mut(&mut self) -> &mut Vec<Sheet> {
        &mut self.sheets
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    /// Independent copy carrying all cells, formats, merges, and dimensions
    pub fn deep_copy(&self) -> Workbook {
        self.clone()
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Sheet;

    #[test]
    fn test_sheet_by_name() {
        let wb = Workbook::from_sheets(
            vec![
                Sheet::new_with_name(10, 10, "Ringkasan"),
                Sheet::new_with_name(10, 10, "Detail"),
            ],
            0,
        );
        assert!(wb.sheet_by_name("Detail").is_some());
        assert!(wb.sheet_by_name("Missing").is_none());
        assert_eq!(wb.sheet_names(), vec!["Ringkasan", "Detail"]);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut wb = Workbook::from_sheets(vec![Sheet::new_with_name(10, 10, "S")], 0);
        wb.sheet_mut(0).unwrap().set_value(0, 0, "original");

        let mut copy = wb.deep_copy();
        copy.sheet_mut(0).unwrap().set_value(0, 0, "changed");

        assert_eq!(wb.sheet(0).unwrap().get_display(0, 0), "original");
        assert_eq!(copy.sheet(0).unwrap().get_display(0, 0), "changed");
    }
}
