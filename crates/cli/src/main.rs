// Lapor CLI - template-driven Excel report generation

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use lapor_config::Settings;
use lapor_template::value::{RenderContext, Scalar};
use lapor_template::{Pattern, TemplateRenderer};

use exit_codes::{EXIT_ERROR, EXIT_RENDER_PARTIAL, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "lapor")]
#[command(about = "Template-driven Excel report generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a template's placeholders and detected repeating patterns
    #[command(after_help = "\
Examples:
  lapor inspect template.xlsx
  lapor inspect template.xlsx --formulas formulas.json")]
    Inspect {
        /// Template workbook (.xlsx)
        template: PathBuf,

        /// Variable definition file (JSON)
        #[arg(long)]
        formulas: Option<PathBuf>,
    },

    /// Render a report: bind data to a template and write the result
    #[command(after_help = "\
Examples:
  lapor render --template template.xlsx --data january.json -o report.xlsx
  lapor render --data january.json --param estate_name='PGE 2B'
  lapor render --estate 'PGE 2B' --param period='Januari 2024'")]
    Render {
        /// Template workbook (falls back to report.templatePath setting)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Variable definition file (falls back to report.formulaPath setting)
        #[arg(long)]
        formulas: Option<PathBuf>,

        /// JSON data file: query results, parameters, groups
        #[arg(long)]
        data: Option<PathBuf>,

        /// Use a configured estate's data file instead of --data
        #[arg(long, conflicts_with = "data")]
        estate: Option<String>,

        /// Output file (default: <template stem>_<timestamp>.xlsx)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Extra parameter, NAME=VALUE. Repeatable; overrides data file entries
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Suppress the render summary on success
        #[arg(long)]
        quiet: bool,
    },

    /// List estates registered in the settings file
    Estates,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Inspect { template, formulas } => cmd_inspect(&template, formulas.as_deref()),
        Commands::Render {
            template,
            formulas,
            data,
            estate,
            output,
            params,
            quiet,
        } => cmd_render(template, formulas, data, estate, output, &params, quiet),
        Commands::Estates => cmd_estates(),
    };

    ExitCode::from(code)
}

// =============================================================================
// inspect
// =============================================================================

fn cmd_inspect(template: &Path, formulas: Option<&Path>) -> u8 {
    let (renderer, import_summary) = match TemplateRenderer::open(template, formulas) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_ERROR;
        }
    };

    println!("{}", import_summary);
    println!();

    for (index, sheet) in renderer.template().sheets().iter().enumerate() {
        let scan = match renderer.scan_for(index) {
            Some(s) => s,
            None => continue,
        };
        println!("Sheet '{}':", sheet.name);
        if scan.is_empty() {
            println!("  (no placeholders)");
            continue;
        }

        for name in scan.names() {
            let count = scan.placeholders[name].len();
            if count == 1 {
                println!("  {{{{{}}}}}", name);
            } else {
                println!("  {{{{{}}}}} x{}", name, count);
            }
        }

        for pattern in renderer.patterns_for(index).unwrap_or(&[]) {
            match pattern {
                Pattern::TemplateRow {
                    row,
                    start_col,
                    end_col,
                    ..
                } => {
                    println!(
                        "  template row at row {} (cols {}-{})",
                        row + 1,
                        start_col + 1,
                        end_col + 1
                    );
                }
                Pattern::DynamicTable {
                    header_row,
                    template_row,
                    headers,
                    ..
                } => {
                    println!(
                        "  table: header row {} [{}], template row {}",
                        header_row + 1,
                        headers.join(", "),
                        template_row + 1
                    );
                }
            }
        }
    }

    let definitions = renderer.definitions();
    if !definitions.variables.is_empty() {
        println!();
        println!("Declared variables: {}", definitions.variables.len());
        let mut names: Vec<&String> = definitions.variables.keys().collect();
        names.sort();
        for name in names {
            println!("  {}", name);
        }
    }

    EXIT_SUCCESS
}

// =============================================================================
// render
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_render(
    template: Option<PathBuf>,
    formulas: Option<PathBuf>,
    data: Option<PathBuf>,
    estate: Option<String>,
    output: Option<PathBuf>,
    params: &[String],
    quiet: bool,
) -> u8 {
    let settings = Settings::load();

    let template = match template.or_else(|| settings.template_path.clone()) {
        Some(p) => p,
        None => {
            eprintln!("error: no template given (use --template or set report.templatePath)");
            return EXIT_USAGE;
        }
    };
    let formulas = formulas.or_else(|| settings.formula_path.clone());

    let data = match (data, estate) {
        (Some(path), _) => Some(path),
        (None, Some(name)) => match settings.estate(&name) {
            Some(entry) => Some(entry.data_path.clone()),
            None => {
                eprintln!("error: estate '{}' is not configured", name);
                eprintln!("       (see {})", Settings::config_path_display());
                return EXIT_USAGE;
            }
        },
        (None, None) => None,
    };

    let mut ctx = match &data {
        Some(path) => match load_context(path) {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("error: {}", e);
                return EXIT_ERROR;
            }
        },
        None => RenderContext::new(),
    };

    for param in params {
        match param.split_once('=') {
            Some((name, value)) => {
                ctx.set_param(name.trim(), parse_param_value(value));
            }
            None => {
                eprintln!("error: bad --param '{}' (expected NAME=VALUE)", param);
                return EXIT_USAGE;
            }
        }
    }

    let (renderer, _) = match TemplateRenderer::open(&template, formulas.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_ERROR;
        }
    };

    let output = output.unwrap_or_else(|| default_output_path(&template, &settings));

    let report = match renderer.render_to_file(&ctx, &output) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_ERROR;
        }
    };

    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    if !quiet {
        println!("{}", report.summary());
        println!("Wrote {}", output.display());
    }

    if report.partial {
        EXIT_RENDER_PARTIAL
    } else {
        EXIT_SUCCESS
    }
}

/// Read a JSON data file into a render context.
fn load_context(path: &Path) -> Result<RenderContext, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("{}: invalid JSON: {}", path.display(), e))?;
    RenderContext::from_json(&doc)
}

/// Parse a --param value: numbers become numbers, ISO dates become
/// dates, everything else stays text.
fn parse_param_value(value: &str) -> Scalar {
    if let Ok(n) = value.trim().parse::<f64>() {
        return Scalar::Number(n);
    }
    Scalar::from_text(value)
}

/// Default output: `<template stem>_<timestamp>.xlsx` in the configured
/// output directory, or the current directory.
fn default_output_path(template: &Path, settings: &Settings) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    let filename = format!(
        "{}_{}.xlsx",
        stem,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    match &settings.output_dir {
        Some(dir) => dir.join(filename),
        None => PathBuf::from(filename),
    }
}

// =============================================================================
// estates
// =============================================================================

fn cmd_estates() -> u8 {
    let settings = Settings::load();
    if settings.estates.is_empty() {
        println!("No estates configured.");
        println!("Edit {} to add entries.", Settings::config_path_display());
        return EXIT_SUCCESS;
    }
    for estate in &settings.estates {
        println!("{}\t{}", estate.name, estate.data_path.display());
    }
    EXIT_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_value() {
        assert_eq!(parse_param_value("42"), Scalar::Number(42.0));
        assert_eq!(parse_param_value("4.5"), Scalar::Number(4.5));
        assert_eq!(
            parse_param_value("PGE 2B"),
            Scalar::Text("PGE 2B".to_string())
        );
        assert!(matches!(parse_param_value("2024-01-01"), Scalar::Date(_)));
    }

    #[test]
    fn test_default_output_path_uses_template_stem() {
        let settings = Settings::default();
        let path = default_output_path(Path::new("/tmp/laporan_harian.xlsx"), &settings);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("laporan_harian_"));
        assert!(name.ends_with(".xlsx"));
    }
}
