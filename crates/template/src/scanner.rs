//! Placeholder scanner: walks every cell of a sheet and records each
//! placeholder token occurrence with its location and original cell text.

use std::collections::HashMap;

use lapor_engine::sheet::Sheet;
use regex::Regex;

/// One placeholder occurrence inside a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub row: usize,
    pub col: usize,
    /// The full cell text the token was embedded in
    pub original_text: String,
}

/// Scan output: placeholder name → every cell it occurs in.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub placeholders: HashMap<String, Vec<Occurrence>>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Distinct placeholder names, sorted for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.placeholders.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn total_occurrences(&self) -> usize {
        self.placeholders.values().map(|v| v.len()).sum()
    }

    /// Occurrences grouped by row: row → list of (col, name).
    pub fn by_row(&self) -> HashMap<usize, Vec<(usize, String)>> {
        let mut rows: HashMap<usize, Vec<(usize, String)>> = HashMap::new();
        for (name, occurrences) in &self.placeholders {
            for occ in occurrences {
                rows.entry(occ.row).or_default().push((occ.col, name.clone()));
            }
        }
        for cols in rows.values_mut() {
            cols.sort_unstable_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        }
        rows
    }

    /// Names occurring in a given cell, in delimiter-match order.
    pub fn names_at(&self, row: usize, col: usize) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .placeholders
            .iter()
            .filter(|(_, occs)| occs.iter().any(|o| o.row == row && o.col == col))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// The four delimiter conventions recognized simultaneously:
/// `{{x}}`, `{$x$}`, `{x}`, `[x]`.
fn delimiter_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").unwrap(),
        Regex::new(r"\{\$\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\$\}").unwrap(),
        Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}").unwrap(),
        Regex::new(r"\[\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\]").unwrap(),
    ]
}

/// Scan a sheet for placeholder tokens.
///
/// All delimiter patterns are tried on every non-empty text cell; matches
/// are unioned and de-duplicated by name within that cell. A name matched
/// by two delimiter styles is the same variable. Pure read of cell values.
pub fn scan(sheet: &Sheet) -> ScanResult {
    let patterns = delimiter_patterns();
    let mut result = ScanResult::default();

    for (&(row, col), cell) in sheet.cells_iter() {
        let text = match cell.value.as_text() {
            Some(t) if !t.is_empty() => t,
            _ => continue,
        };
        if !text.contains('{') && !text.contains('[') {
            continue;
        }

        let mut seen_in_cell: Vec<&str> = Vec::new();
        for pattern in &patterns {
            for caps in pattern.captures_iter(text) {
                let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                if name.is_empty() || seen_in_cell.contains(&name) {
                    continue;
                }
                seen_in_cell.push(name);
                result
                    .placeholders
                    .entry(name.to_string())
                    .or_default()
                    .push(Occurrence {
                        row,
                        col,
                        original_text: text.to_string(),
                    });
            }
        }
    }

    result
}

/// Replace every delimiter form of `name` inside `text` with `replacement`.
/// Used for mixed-text substitution where a cell holds literal text plus
/// one or more tokens.
pub fn substitute(text: &str, name: &str, replacement: &str) -> String {
    let escaped = regex::escape(name);
    let forms = [
        format!(r"\{{\{{\s*{}\s*\}}\}}", escaped),
        format!(r"\{{\$\s*{}\s*\$\}}", escaped),
        format!(r"\{{\s*{}\s*\}}", escaped),
        format!(r"\[\s*{}\s*\]", escaped),
    ];
    let mut out = text.to_string();
    for form in &forms {
        let re = Regex::new(form).unwrap();
        out = re.replace_all(&out, replacement).to_string();
    }
    out
}

/// True if the whole cell text is exactly one token for `name`
/// (surrounding whitespace ignored). Whole-token cells receive typed
/// values instead of string substitution.
pub fn is_sole_token(text: &str, name: &str) -> bool {
    substitute(text, name, "").trim().is_empty() && !text.trim().is_empty()
}
