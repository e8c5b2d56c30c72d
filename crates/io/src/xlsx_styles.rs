//! XLSX formatting parser: reads styles.xml and per-cell style IDs from
//! worksheet XML inside the XLSX (ZIP) archive.
//!
//! calamine gives us values but not formatting, so this layer recovers the
//! fonts, fills, borders and number formats that template rows carry.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use lapor_engine::cell::{
    Alignment, BorderStyle, CellBorder, CellFormat, DateStyle, NumberFormat, VerticalAlignment,
};
use zip::ZipArchive;

// =============================================================================
// Public types
// =============================================================================

/// Parsed style table from styles.xml — maps cellXfs index → CellFormat.
pub struct StyleTable {
    pub styles: Vec<CellFormat>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellFormat> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Per-cell style references and layout extracted from one worksheet XML.
#[derive(Default)]
pub struct SheetFormatting {
    /// (row, col, style_id) triples
    pub cell_styles: Vec<(usize, usize, usize)>,
    /// Column widths in raw Excel character-width units
    pub col_widths: HashMap<usize, f64>,
    /// Row heights in raw Excel point units
    pub row_heights: HashMap<usize, f64>,
    /// Merged cell regions: (start_row, start_col, end_row, end_col)
    pub merged_regions: Vec<(usize, usize, usize, usize)>,
}

/// Stats about style parsing for the import report.
#[derive(Debug, Default)]
pub struct StyleImportStats {
    pub styles_applied: usize,
    pub unique_styles: usize,
    pub unsupported_features: Vec<String>,
}

// =============================================================================
// XML entity unescaping
// =============================================================================

/// Unescape the 5 predefined XML entities: &amp; &lt; &gt; &quot; &apos;
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
}

// =============================================================================
// Number format mapping
// =============================================================================

fn builtin_number_format(id: u16) -> NumberFormat {
    match id {
        0 => NumberFormat::General,
        1 | 3 | 37 | 38 => NumberFormat::Number { decimals: 0 },
        2 | 4 | 11 | 39 | 40 | 48 => NumberFormat::Number { decimals: 2 },
        9 => NumberFormat::Percent { decimals: 0 },
        10 => NumberFormat::Percent { decimals: 2 },
        14 | 17 => NumberFormat::Date {
            style: DateStyle::Short,
        },
        15 | 16 => NumberFormat::Date {
            style: DateStyle::Long,
        },
        18..=21 | 45..=47 => NumberFormat::Time,
        22 => NumberFormat::DateTime,
        44 => NumberFormat::Currency { decimals: 2 },
        49 => NumberFormat::Text,
        _ => NumberFormat::General,
    }
}

/// Classify a custom numFmt code into the nearest built-in category.
///
/// Report templates use custom codes like "dd mmmm yyyy" or "#,##0.00" —
/// we keep the category (date vs number vs currency) rather than the exact
/// code, which is what row expansion needs when copying formats.
fn classify_format_code(code: &str) -> NumberFormat {
    // Strip quoted literals and color tags before inspecting
    let mut stripped = String::with_capacity(code.len());
    let mut in_quote = false;
    let mut in_bracket = false;
    for ch in code.chars() {
        match ch {
            '"' => in_quote = !in_quote,
            '[' if !in_quote => in_bracket = true,
            ']' if !in_quote => in_bracket = false,
            _ if !in_quote && !in_bracket => stripped.push(ch),
            _ => {}
        }
    }
    let lower = stripped.to_lowercase();

    let has_date = lower.contains('y') || lower.contains("mmm") || lower.contains('d');
    let has_time = lower.contains('h') || lower.contains(':') || lower.contains('s');

    if has_date && has_time {
        return NumberFormat::DateTime;
    }
    if has_date {
        let style = if lower.contains("mmm") {
            DateStyle::Long
        } else {
            DateStyle::Short
        };
        return NumberFormat::Date { style };
    }
    if has_time {
        return NumberFormat::Time;
    }
    if lower.contains('%') {
        return NumberFormat::Percent {
            decimals: decimals_after_point(&lower),
        };
    }
    if code.contains('$') || code.contains("Rp") || code.contains('€') || code.contains('£') {
        return NumberFormat::Currency {
            decimals: decimals_after_point(&lower),
        };
    }
    if lower.contains('0') || lower.contains('#') {
        return NumberFormat::Number {
            decimals: decimals_after_point(&lower),
        };
    }
    if lower.contains('@') {
        return NumberFormat::Text;
    }
    NumberFormat::General
}

/// Count the digit placeholders after the first decimal point in a format code.
fn decimals_after_point(code: &str) -> u8 {
    match code.find('.') {
        Some(pos) => code[pos + 1..]
            .chars()
            .take_while(|c| *c == '0' || *c == '#')
            .count()
            .min(u8::MAX as usize) as u8,
        None => 0,
    }
}

// =============================================================================
// Indexed color palette (standard 64 Excel colors)
// =============================================================================

/// Standard Excel indexed color palette (RGBA).
/// Index 0-7 are the primary colors, 8-63 are extended.
fn indexed_color(idx: u8) -> Option<[u8; 4]> {
    let rgb: [u8; 3] = match idx {
        0 | 8 => [0, 0, 0],
        1 | 9 => [255, 255, 255],
        2 | 10 => [255, 0, 0],
        3 | 11 => [0, 255, 0],
        4 | 12 => [0, 0, 255],
        5 | 13 => [255, 255, 0],
        6 | 14 => [255, 0, 255],
        7 | 15 => [0, 255, 255],
        16 => [128, 0, 0],
        17 => [0, 128, 0],
        18 => [0, 0, 128],
        19 => [128, 128, 0],
        20 => [128, 0, 128],
        21 => [0, 128, 128],
        22 => [192, 192, 192],
        23 => [128, 128, 128],
        24 => [153, 153, 255],
        25 => [153, 51, 102],
        26 => [255, 255, 204],
        27 => [204, 255, 255],
        28 => [102, 0, 102],
        29 => [255, 128, 128],
        30 => [0, 102, 204],
        31 => [204, 204, 255],
        32 => [0, 0, 128],
        33 => [255, 0, 255],
        34 => [255, 255, 0],
        35 => [0, 255, 255],
        36 => [128, 0, 128],
        37 => [128, 0, 0],
        38 => [0, 128, 128],
        39 => [0, 0, 255],
        40 => [0, 204, 255],
        41 => [204, 255, 255],
        42 => [204, 255, 204],
        43 => [255, 255, 153],
        44 => [153, 204, 255],
        45 => [255, 153, 204],
        46 => [204, 153, 255],
        47 => [255, 204, 153],
        48 => [51, 102, 255],
        49 => [51, 204, 204],
        50 => [153, 204, 0],
        51 => [255, 204, 0],
        52 => [255, 153, 0],
        53 => [255, 102, 0],
        54 => [102, 102, 153],
        55 => [150, 150, 150],
        56 => [0, 51, 102],
        57 => [51, 153, 102],
        58 => [0, 51, 0],
        59 => [51, 51, 0],
        60 => [153, 51, 0],
        61 => [153, 51, 51],
        62 => [51, 51, 153],
        63 => [51, 51, 51],
        64 => return Some([0, 0, 0, 255]),      // System foreground
        65 => return Some([255, 255, 255, 255]), // System background
        _ => return None,
    };
    Some([rgb[0], rgb[1], rgb[2], 255])
}

/// Flat theme color defaults (approximate, no tint math).
fn theme_color_default(idx: u8) -> Option<[u8; 4]> {
    let rgb: [u8; 3] = match idx {
        0 => [255, 255, 255], // Background 1 (lt1)
        1 => [0, 0, 0],       // Text 1 (dk1)
        2 => [238, 236, 225], // Background 2 (lt2)
        3 => [31, 73, 125],   // Text 2 (dk2)
        4 => [79, 129, 189],  // Accent 1
        5 => [192, 80, 77],   // Accent 2
        6 => [155, 187, 89],  // Accent 3
        7 => [128, 100, 162], // Accent 4
        8 => [75, 172, 198],  // Accent 5
        9 => [247, 150, 70],  // Accent 6
        _ => return None,
    };
    Some([rgb[0], rgb[1], rgb[2], 255])
}

// =============================================================================
// Color parsing
// =============================================================================

/// Parse a color from XML attributes (rgb, indexed, or theme).
/// Returns RGBA as [u8; 4], or None if no color found.
fn parse_color_attrs(
    attrs: &[(Vec<u8>, Vec<u8>)],
    unsupported: &mut Vec<String>,
) -> Option<[u8; 4]> {
    let mut rgb_val: Option<Vec<u8>> = None;
    let mut indexed_val: Option<u8> = None;
    let mut theme_val: Option<u8> = None;

    for (key, value) in attrs {
        match key.as_slice() {
            b"rgb" => rgb_val = Some(value.clone()),
            b"indexed" => {
                indexed_val = std::str::from_utf8(value).ok().and_then(|s| s.parse().ok());
            }
            b"theme" => {
                theme_val = std::str::from_utf8(value).ok().and_then(|s| s.parse().ok());
            }
            _ => {}
        }
    }

    // Prefer rgb > indexed > theme
    if let Some(hex) = rgb_val {
        return parse_argb_hex(&hex);
    }
    if let Some(idx) = indexed_val {
        return indexed_color(idx);
    }
    if let Some(idx) = theme_val {
        let color = theme_color_default(idx);
        if color.is_some() && !unsupported.iter().any(|s| s.starts_with("theme tints")) {
            unsupported.push("theme tints approximated".to_string());
        }
        return color;
    }
    None
}

/// Parse AARRGGBB hex string to RGBA [u8; 4].
fn parse_argb_hex(hex: &[u8]) -> Option<[u8; 4]> {
    let s = std::str::from_utf8(hex).ok()?;
    let s = s.trim_start_matches('#');

    if s.len() == 8 {
        // AARRGGBB → RGBA
        let a = u8::from_str_radix(&s[0..2], 16).ok()?;
        let r = u8::from_str_radix(&s[2..4], 16).ok()?;
        let g = u8::from_str_radix(&s[4..6], 16).ok()?;
        let b = u8::from_str_radix(&s[6..8], 16).ok()?;
        Some([r, g, b, a])
    } else if s.len() == 6 {
        // RRGGBB → RGBA (alpha=255)
        let r = u8::from_str_radix(&s[0..2], 16).ok()?;
        let g = u8::from_str_radix(&s[2..4], 16).ok()?;
        let b = u8::from_str_radix(&s[4..6], 16).ok()?;
        Some([r, g, b, 255])
    } else {
        None
    }
}

// =============================================================================
// Internal parsed components
// =============================================================================

/// Parsed font entry from <fonts>.
#[derive(Debug, Clone, Default)]
struct ParsedFont {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    size: Option<f32>,
    color: Option<[u8; 4]>,
    family: Option<String>,
}

/// Parsed fill entry from <fills>.
#[derive(Debug, Clone, Default)]
struct ParsedFill {
    fill_color: Option<[u8; 4]>,
}

/// Parsed border entry from <borders>.
#[derive(Debug, Clone, Default)]
struct ParsedBorder {
    top: CellBorder,
    right: CellBorder,
    bottom: CellBorder,
    left: CellBorder,
}

// =============================================================================
// styles.xml parser
// =============================================================================

/// Parse styles.xml content into a StyleTable.
pub fn parse_styles_xml(xml: &str) -> (StyleTable, Vec<String>) {
    let mut unsupported: Vec<String> = Vec::new();

    let custom_num_fmts = parse_num_fmts(xml);
    let fonts = parse_fonts(xml, &mut unsupported);
    let fills = parse_fills(xml, &mut unsupported);
    let borders = parse_borders(xml, &mut unsupported);

    let styles = parse_cell_xfs(xml, &custom_num_fmts, &fonts, &fills, &borders);

    (StyleTable { styles }, unsupported)
}

/// Parse <numFmts> section → HashMap<formatId, formatCode>
fn parse_num_fmts(xml: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => {
                in_num_fmts = true;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => {
                break;
            }
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if in_num_fmts && e.name().as_ref() == b"numFmt" =>
            {
                let mut id: Option<u16> = None;
                let mut code: Option<String> = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"numFmtId" => {
                            id = std::str::from_utf8(&attr.value)
                                .ok()
                                .and_then(|s| s.parse().ok());
                        }
                        b"formatCode" => {
                            // Must unescape XML entities: &quot; → "
                            let raw = String::from_utf8_lossy(&attr.value).to_string();
                            code = Some(unescape_xml(&raw));
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(code)) = (id, code) {
                    map.insert(id, code);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    map
}

/// Parse <fonts> section into Vec<ParsedFont>.
fn parse_fonts(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedFont> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fonts>, 2 = inside <font>
    let mut current = ParsedFont::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = ParsedFont::default();
                }
                b"color" if depth == 2 => {
                    let attrs = collect_attrs(e);
                    current.color = parse_color_attrs(&attrs, unsupported);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => match e.name().as_ref() {
                b"b" => current.bold = true,
                b"i" => current.italic = true,
                b"u" => current.underline = true,
                b"strike" => current.strikethrough = true,
                b"sz" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"val" {
                            current.size = std::str::from_utf8(&attr.value)
                                .ok()
                                .and_then(|s| s.parse().ok());
                        }
                    }
                }
                b"color" => {
                    let attrs = collect_attrs(e);
                    current.color = parse_color_attrs(&attrs, unsupported);
                }
                b"name" | b"rFont" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"val" {
                            current.family =
                                Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(current.clone());
                    depth = 1;
                }
                b"fonts" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

/// Parse <fills> section into Vec<ParsedFill>.
fn parse_fills(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedFill> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fills>, 2 = inside <fill>
    let mut in_pattern_fill = false;
    let mut current = ParsedFill::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    current = ParsedFill::default();
                    in_pattern_fill = false;
                }
                b"patternFill" if depth == 2 => in_pattern_fill = true,
                b"gradientFill" if depth == 2 => {
                    if !unsupported.iter().any(|s| s.starts_with("gradient fills")) {
                        unsupported.push("gradient fills".to_string());
                    }
                }
                b"fgColor" if in_pattern_fill => {
                    let attrs = collect_attrs(e);
                    current.fill_color = parse_color_attrs(&attrs, unsupported);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"fgColor" && in_pattern_fill {
                    let attrs = collect_attrs(e);
                    current.fill_color = parse_color_attrs(&attrs, unsupported);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"patternFill" => in_pattern_fill = false,
                b"fill" if depth == 2 => {
                    fills.push(current.clone());
                    depth = 1;
                    in_pattern_fill = false;
                }
                b"fills" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

/// Parse <borders> section into Vec<ParsedBorder>.
fn parse_borders(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedBorder> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <borders>, 2 = inside <border>
    let mut current_side: Option<&'static str> = None;
    let mut current = ParsedBorder::default();
    let mut side_style = BorderStyle::None;
    let mut side_color: Option<[u8; 4]> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"borders" if depth == 0 => depth = 1,
                    b"border" if depth == 1 => {
                        depth = 2;
                        current = ParsedBorder::default();
                    }
                    b"left" | b"right" | b"top" | b"bottom" if depth == 2 => {
                        current_side = Some(match name.as_ref() {
                            b"left" => "left",
                            b"right" => "right",
                            b"top" => "top",
                            _ => "bottom",
                        });
                        side_style = BorderStyle::None;
                        side_color = None;
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"style" {
                                side_style =
                                    parse_border_style(&String::from_utf8_lossy(&attr.value));
                            }
                        }
                    }
                    b"color" if current_side.is_some() => {
                        let attrs = collect_attrs(e);
                        side_color = parse_color_attrs(&attrs, unsupported);
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"left" | b"right" | b"top" | b"bottom" if depth == 2 => {
                        // Self-closing border side, style attribute only
                        let mut style = BorderStyle::None;
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"style" {
                                style = parse_border_style(&String::from_utf8_lossy(&attr.value));
                            }
                        }
                        if style != BorderStyle::None {
                            let border = CellBorder { style, color: None };
                            match name.as_ref() {
                                b"left" => current.left = border,
                                b"right" => current.right = border,
                                b"top" => current.top = border,
                                _ => current.bottom = border,
                            }
                        }
                    }
                    b"color" if current_side.is_some() => {
                        let attrs = collect_attrs(e);
                        side_color = parse_color_attrs(&attrs, unsupported);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"left" | b"right" | b"top" | b"bottom" if depth == 2 => {
                    if let Some(side) = current_side.take() {
                        let border = CellBorder {
                            style: side_style,
                            color: side_color,
                        };
                        match side {
                            "left" => current.left = border,
                            "right" => current.right = border,
                            "top" => current.top = border,
                            _ => current.bottom = border,
                        }
                    }
                    side_style = BorderStyle::None;
                    side_color = None;
                }
                b"border" if depth == 2 => {
                    borders.push(current.clone());
                    depth = 1;
                }
                b"borders" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    borders
}

fn parse_border_style(s: &str) -> BorderStyle {
    match s {
        "thin" => BorderStyle::Thin,
        "hair" => BorderStyle::Hair,
        "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" => BorderStyle::Medium,
        "thick" => BorderStyle::Thick,
        "double" => BorderStyle::Double,
        "dashed" | "dashDot" | "dashDotDot" | "slantDashDot" => BorderStyle::Dashed,
        "dotted" => BorderStyle::Dotted,
        _ => BorderStyle::None,
    }
}

/// Parse <cellXfs> section and resolve each <xf> into a CellFormat.
fn parse_cell_xfs(
    xml: &str,
    custom_num_fmts: &HashMap<u16, String>,
    fonts: &[ParsedFont],
    fills: &[ParsedFill],
    borders: &[ParsedBorder],
) -> Vec<CellFormat> {
    let mut styles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut in_xf = false;
    let mut current = XfEntry::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    in_xf = true;
                    current = parse_xf_attrs(e);
                }
                b"alignment" if in_xf => parse_alignment_attrs(e, &mut current),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => {
                    // Self-closing <xf .../>
                    let xf = parse_xf_attrs(e);
                    styles.push(resolve_xf(&xf, custom_num_fmts, fonts, fills, borders));
                }
                b"alignment" if in_xf => parse_alignment_attrs(e, &mut current),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" if in_xf => {
                    styles.push(resolve_xf(&current, custom_num_fmts, fonts, fills, borders));
                    in_xf = false;
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

#[derive(Debug, Default)]
struct XfEntry {
    num_fmt_id: Option<u16>,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    h_align: Option<String>,
    v_align: Option<String>,
    wrap_text: bool,
}

fn parse_xf_attrs(e: &quick_xml::events::BytesStart) -> XfEntry {
    let mut xf = XfEntry::default();
    for attr in e.attributes().flatten() {
        let num = || std::str::from_utf8(&attr.value).ok().and_then(|s| s.parse().ok());
        match attr.key.as_ref() {
            b"numFmtId" => {
                xf.num_fmt_id = std::str::from_utf8(&attr.value)
                    .ok()
                    .and_then(|s| s.parse().ok());
            }
            b"fontId" => xf.font_id = num(),
            b"fillId" => xf.fill_id = num(),
            b"borderId" => xf.border_id = num(),
            _ => {}
        }
    }
    xf
}

fn parse_alignment_attrs(e: &quick_xml::events::BytesStart, xf: &mut XfEntry) {
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"horizontal" => {
                xf.h_align = Some(String::from_utf8_lossy(&attr.value).to_string());
            }
            b"vertical" => {
                xf.v_align = Some(String::from_utf8_lossy(&attr.value).to_string());
            }
            b"wrapText" => {
                xf.wrap_text = attr.value.as_ref() == b"1" || attr.value.as_ref() == b"true";
            }
            _ => {}
        }
    }
}

/// Resolve an XfEntry into a CellFormat using the parsed component tables.
fn resolve_xf(
    xf: &XfEntry,
    custom_num_fmts: &HashMap<u16, String>,
    fonts: &[ParsedFont],
    fills: &[ParsedFill],
    borders: &[ParsedBorder],
) -> CellFormat {
    let mut format = CellFormat::default();

    if let Some(font) = xf.font_id.and_then(|id| fonts.get(id)) {
        format.bold = font.bold;
        format.italic = font.italic;
        format.underline = font.underline;
        format.strikethrough = font.strikethrough;
        format.font_size = font.size;
        format.font_color = font.color;
        format.font_family = font.family.clone();
    }

    if let Some(fill) = xf.fill_id.and_then(|id| fills.get(id)) {
        format.fill_color = fill.fill_color;
    }

    if let Some(border) = xf.border_id.and_then(|id| borders.get(id)) {
        format.border_top = border.top;
        format.border_right = border.right;
        format.border_bottom = border.bottom;
        format.border_left = border.left;
    }

    if let Some(num_fmt_id) = xf.num_fmt_id {
        format.number_format = match custom_num_fmts.get(&num_fmt_id) {
            Some(code) => classify_format_code(code),
            None => builtin_number_format(num_fmt_id),
        };
    }

    if let Some(ref h) = xf.h_align {
        format.alignment = match h.as_str() {
            "left" => Alignment::Left,
            "center" | "centerContinuous" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::General,
        };
    }

    if let Some(ref v) = xf.v_align {
        format.vertical_alignment = match v.as_str() {
            "top" => VerticalAlignment::Top,
            "center" => VerticalAlignment::Middle,
            _ => VerticalAlignment::Bottom,
        };
    }

    format.wrap_text = xf.wrap_text;

    format
}

// =============================================================================
// Worksheet XML parser — per-cell style IDs + layout
// =============================================================================

/// Parse a worksheet XML to extract per-cell style IDs and layout dimensions.
pub fn parse_sheet_formatting(xml: &str) -> SheetFormatting {
    let mut out = SheetFormatting::default();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"row" => {
                    let mut row_idx: Option<usize> = None;
                    let mut custom_height = false;
                    let mut ht: Option<f64> = None;

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => {
                                row_idx = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse::<usize>().ok())
                                    .map(|r| r.saturating_sub(1)); // 1-based → 0-based
                            }
                            b"ht" => {
                                ht = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse().ok());
                            }
                            b"customHeight" => {
                                custom_height = attr.value.as_ref() == b"1"
                                    || attr.value.as_ref() == b"true";
                            }
                            _ => {}
                        }
                    }

                    if custom_height {
                        if let (Some(row), Some(height)) = (row_idx, ht) {
                            out.row_heights.insert(row, height);
                        }
                    }
                }
                b"c" => {
                    // Cell element: style ID from s="N", position from r="A1"
                    let mut style_id: Option<usize> = None;
                    let mut cell_ref: Option<String> = None;

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"s" => {
                                style_id = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse().ok());
                            }
                            b"r" => {
                                cell_ref =
                                    Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                            _ => {}
                        }
                    }

                    if let (Some(style_id), Some(ref cell_ref)) = (style_id, &cell_ref) {
                        // style_id 0 = default, skip
                        if style_id > 0 {
                            if let Some((row, col)) = parse_cell_ref(cell_ref) {
                                out.cell_styles.push((row, col, style_id));
                            }
                        }
                    }
                }
                b"col" => {
                    let mut min_col: Option<usize> = None;
                    let mut max_col: Option<usize> = None;
                    let mut width: Option<f64> = None;
                    let mut custom_width = false;

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"min" => {
                                min_col = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse::<usize>().ok())
                                    .map(|c| c.saturating_sub(1));
                            }
                            b"max" => {
                                max_col = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse::<usize>().ok())
                                    .map(|c| c.saturating_sub(1));
                            }
                            b"width" => {
                                width = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse().ok());
                            }
                            b"customWidth" => {
                                custom_width = attr.value.as_ref() == b"1"
                                    || attr.value.as_ref() == b"true";
                            }
                            _ => {}
                        }
                    }

                    if custom_width {
                        if let (Some(min), Some(max), Some(w)) = (min_col, max_col, width) {
                            for col in min..=max {
                                out.col_widths.insert(col, w);
                            }
                        }
                    }
                }
                b"mergeCell" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"ref" {
                            let ref_str = String::from_utf8_lossy(&attr.value);
                            if let Some(region) = parse_merge_ref(&ref_str) {
                                out.merged_regions.push(region);
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

/// Parse a merge range reference like "A1:C3" into (start_row, start_col, end_row, end_col).
pub fn parse_merge_ref(r: &str) -> Option<(usize, usize, usize, usize)> {
    let (first, second) = r.split_once(':')?;
    let (sr, sc) = parse_cell_ref(first)?;
    let (er, ec) = parse_cell_ref(second)?;
    Some((sr, sc, er, ec))
}

/// Parse a cell reference like "B5" into (row, col) = (4, 1).
fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let mut col_part = String::new();
    let mut row_part = String::new();

    for ch in r.chars() {
        if ch.is_ascii_alphabetic() {
            col_part.push(ch);
        } else if ch.is_ascii_digit() {
            row_part.push(ch);
        }
    }

    if col_part.is_empty() || row_part.is_empty() {
        return None;
    }

    let mut col: usize = 0;
    for ch in col_part.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    col = col.saturating_sub(1); // 1-based → 0-based

    let row: usize = row_part.parse().ok()?;
    let row = row.saturating_sub(1); // 1-based → 0-based

    Some((row, col))
}

// =============================================================================
// Top-level import entry point
// =============================================================================

/// Parse all formatting data from an XLSX file.
/// Returns (style_table, per_sheet_formatting, stats).
/// `sheet_names` must match the order of sheets in the workbook.
pub fn parse_xlsx_formatting(
    path: &Path,
    sheet_names: &[String],
) -> Result<(StyleTable, Vec<SheetFormatting>, StyleImportStats), String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open XLSX file for styles: {}", e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| format!("Failed to read XLSX as ZIP for styles: {}", e))?;

    let mut stats = StyleImportStats::default();

    // Step 1: Parse styles.xml
    let (style_table, unsupported) = match read_zip_file(&mut archive, "xl/styles.xml") {
        Ok(xml) => parse_styles_xml(&xml),
        Err(_) => {
            // No styles.xml — return empty formatting for every sheet
            return Ok((
                StyleTable { styles: Vec::new() },
                sheet_names.iter().map(|_| SheetFormatting::default()).collect(),
                stats,
            ));
        }
    };
    stats.unsupported_features = unsupported;
    stats.unique_styles = style_table.len();

    // Step 2: Resolve worksheet paths
    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let worksheet_paths = resolve_worksheet_paths_for_sheets(&workbook_xml, &rels_xml, sheet_names);

    // Step 3: Parse each worksheet for per-cell style IDs and layout
    let mut sheet_formats = Vec::new();
    for ws_path in &worksheet_paths {
        let formatting = match read_zip_file(&mut archive, ws_path) {
            Ok(xml) => {
                let sf = parse_sheet_formatting(&xml);
                stats.styles_applied += sf.cell_styles.len();
                sf
            }
            Err(_) => SheetFormatting::default(),
        };
        sheet_formats.push(formatting);
    }

    // Pad with empty formatting if we have fewer worksheet paths than sheets
    while sheet_formats.len() < sheet_names.len() {
        sheet_formats.push(SheetFormatting::default());
    }

    Ok((style_table, sheet_formats, stats))
}

// =============================================================================
// Helpers
// =============================================================================

/// Collect XML attributes into a Vec of (key, value) pairs.
fn collect_attrs(e: &quick_xml::events::BytesStart) -> Vec<(Vec<u8>, Vec<u8>)> {
    e.attributes()
        .flatten()
        .map(|a| (a.key.as_ref().to_vec(), a.value.to_vec()))
        .collect()
}

/// Read a file from a ZIP archive.
fn read_zip_file<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Resolve worksheet XML paths for specific sheet names (in order).
fn resolve_worksheet_paths_for_sheets(
    workbook_xml: &str,
    rels_xml: &str,
    sheet_names: &[String],
) -> Vec<String> {
    // Parse workbook.xml to get (name, rId) pairs
    let mut name_to_rid: Vec<(String, String)> = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"sheet" =>
            {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        b"r:id" => {
                            rid = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    name_to_rid.push((name, rid));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // Parse rels to get rid → target
    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => {
                            target = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let name_rid_map: HashMap<&str, &str> = name_to_rid
        .iter()
        .map(|(n, r)| (n.as_str(), r.as_str()))
        .collect();

    sheet_names
        .iter()
        .map(|name| {
            name_rid_map
                .get(name.as_str())
                .and_then(|rid| rid_to_target.get(*rid))
                .map(|target| format!("xl/{}", target))
                .unwrap_or_default()
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
