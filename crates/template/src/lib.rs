//! `lapor-template` — Placeholder-driven template expansion and data binding.
//!
//! Scans a spreadsheet template for placeholder tokens and repeating-row
//! patterns, resolves each placeholder against query results and request
//! parameters, and expands template rows to fit variable-length result sets
//! while preserving per-cell formatting.

pub mod definitions;
pub mod error;
pub mod expander;
pub mod patterns;
pub mod renderer;
pub mod resolver;
pub mod scanner;
pub mod value;

pub use definitions::{FormulaFile, VariableDef};
pub use error::{ResolveError, TemplateError};
pub use patterns::Pattern;
pub use renderer::{RenderReport, TemplateRenderer};
pub use scanner::{scan, Occurrence, ScanResult};
pub use value::{Record, RenderContext, Scalar};
