// Application settings
// Loaded from ~/.config/lapor/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One estate the operator generates reports for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstateEntry {
    /// Display name, e.g. "PGE 2B"
    pub name: String,

    /// Data file holding this estate's query results
    pub data_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Report generation
    #[serde(rename = "report.templatePath")]
    pub template_path: Option<PathBuf>,

    #[serde(rename = "report.formulaPath")]
    pub formula_path: Option<PathBuf>,

    #[serde(rename = "report.outputDir")]
    pub output_dir: Option<PathBuf>,

    // Display
    #[serde(rename = "report.dateFormat")]
    pub date_format: String,

    // Estates
    #[serde(rename = "estates", default)]
    pub estates: Vec<EstateEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Report generation
            template_path: None,
            formula_path: None,
            output_dir: None,
            // Display
            date_format: "%d %B %Y".to_string(),
            // Estates
            estates: Vec::new(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lapor");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file();
            return settings;
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Error parsing settings.json: {}", e);
                eprintln!("Using default settings");
                Self::default()
            }),
            Err(e) => {
                eprintln!("Error reading settings.json: {}", e);
                Self::default()
            }
        }
    }

    /// Parse settings content, tolerating // comment lines
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Look up an estate by name (case-insensitive)
    pub fn estate(&self, name: &str) -> Option<&EstateEntry> {
        self.estates
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(&path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self) {
        let path = Self::config_path();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Report generation defaults (CLI flags override these)
    "report.templatePath": null,
    "report.formulaPath": null,
    "report.outputDir": null,

    // Date rendering in generated reports
    "report.dateFormat": "%d %B %Y",

    // Registered estates: name plus the data file feeding its reports
    "estates": []
}
"#;

        if let Err(e) = fs::write(&path, default_config) {
            eprintln!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerates_comments() {
        let content = r#"{
    // comment line
    "report.dateFormat": "%Y-%m-%d",
    "estates": [
        {"name": "PGE 2B", "data_path": "/data/pge2b.json"}
    ]
}"#;
        let settings = Settings::parse(content).unwrap();
        assert_eq!(settings.date_format, "%Y-%m-%d");
        assert_eq!(settings.estates.len(), 1);
        assert_eq!(settings.estates[0].name, "PGE 2B");
    }

    #[test]
    fn test_estate_lookup_is_case_insensitive() {
        let mut settings = Settings::default();
        settings.estates.push(EstateEntry {
            name: "PGE 2B".to_string(),
            data_path: PathBuf::from("/data/pge2b.json"),
        });
        assert!(settings.estate("pge 2b").is_some());
        assert!(settings.estate("PGE 3A").is_none());
    }

    #[test]
    fn test_unknown_fields_fall_back_to_defaults() {
        let settings = Settings::parse("{}").unwrap();
        assert_eq!(settings.date_format, "%d %B %Y");
        assert!(settings.template_path.is_none());
        assert!(settings.estates.is_empty());
    }
}
