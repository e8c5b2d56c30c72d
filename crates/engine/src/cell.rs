use serde::{Deserialize, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum Alignment {
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum VerticalAlignment {
    Top,
    Middle,
    #[default]
    Bottom,
}

/// Date display style
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum DateStyle {
    #[default]
    Short,  // DD/MM/YYYY
    Long,   // DD Month YYYY
}

/// Number format type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum NumberFormat {
    #[default]
    General,
    Number { decimals: u8 },
    Currency { decimals: u8 },
    Percent { decimals: u8 },
    Date { style: DateStyle },
    Time,
    DateTime,
    Text,
}

/// Border line style for one cell edge
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

/// One edge of a cell border: style plus RGBA color
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CellBorder {
    pub style: BorderStyle,
    pub color: Option<[u8; 4]>,
}

impl CellBorder {
    pub fn is_none(&self) -> bool {
        self.style == BorderStyle::None
    }
}

/// Cell formatting options
///
/// Colors are RGBA. `None` means "inherit default" for optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub font_color: Option<[u8; 4]>,
    pub fill_color: Option<[u8; 4]>,
    pub alignment: Alignment,
    pub vertical_alignment: VerticalAlignment,
    pub wrap_text: bool,
    pub border_top: CellBorder,
    pub border_right: CellBorder,
    pub border_bottom: CellBorder,
    pub border_left: CellBorder,
    pub number_format: NumberFormat,
}

impl CellFormat {
    /// True if any visible formatting is set (used to decide whether a
    /// value-less cell is worth materializing).
    pub fn is_visually_relevant(&self) -> bool {
        self.bold
            || self.italic
            || self.underline
            || self.strikethrough
            || self.font_color.is_some()
            || self.fill_color.is_some()
            || !self.border_top.is_none()
            || !self.border_right.is_none()
            || !self.border_bottom.is_none()
            || !self.border_left.is_none()
    }

    /// True if any border edge is set
    pub fn has_border(&self) -> bool {
        !self.border_top.is_none()
            || !self.border_right.is_none()
            || !self.border_bottom.is_none()
            || !self.border_left.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            return CellValue::Number(num);
        }

        CellValue::Text(trimmed.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The cell's text content, or empty string for non-text values
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => {
                if *b { "TRUE".to_string() } else { "FALSE".to_string() }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub format: CellFormat,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }
}
