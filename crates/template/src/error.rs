use std::fmt;

/// Fatal errors: only these propagate out of a render call.
#[derive(Debug)]
pub enum TemplateError {
    /// Template workbook missing or unparseable.
    TemplateLoad(String),
    /// Formula/variable definition file missing or unreadable.
    DefinitionLoad(String),
    /// Definition file parsed but a variable entry is malformed.
    DefinitionParse { variable: String, message: String },
    /// Output save failure.
    Save(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateLoad(msg) => write!(f, "template load error: {msg}"),
            Self::DefinitionLoad(msg) => write!(f, "definition load error: {msg}"),
            Self::DefinitionParse { variable, message } => {
                write!(f, "definition '{variable}': {message}")
            }
            Self::Save(msg) => write!(f, "save error: {msg}"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Per-variable resolution failure. The renderer logs these and substitutes
/// the variable's default rather than aborting the render.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// No definition, no context match, no built-in default.
    NotFound(String),
    /// Definition references a context key that does not exist.
    MissingSource { variable: String, source: String },
    /// Definition references a field absent from the records.
    MissingField { variable: String, field: String },
    /// Malformed expression or strftime pattern in the definition.
    BadExpression { variable: String, expression: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "variable '{name}' not found"),
            Self::MissingSource { variable, source } => {
                write!(f, "variable '{variable}': no data source '{source}'")
            }
            Self::MissingField { variable, field } => {
                write!(f, "variable '{variable}': no field '{field}' in records")
            }
            Self::BadExpression { variable, expression } => {
                write!(f, "variable '{variable}': cannot evaluate '{expression}'")
            }
        }
    }
}

impl std::error::Error for ResolveError {}
