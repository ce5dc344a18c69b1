use roxmltree::{Document, ParsingOptions};

use super::{DisplaySurfaces, ViewMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TextContent {
    #[default]
    Empty,
    Plain(String),
    Markup(String),
}

impl TextContent {
    pub fn as_str(&self) -> &str {
        match self {
            TextContent::Empty => "",
            TextContent::Plain(s) | TextContent::Markup(s) => s,
        }
    }
}

/// Headless display surfaces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemorySurfaces {
    pub text: TextContent,
    pub svg: String,
    pub svg_size: Option<BoundingBox>,
    pub view_mode: Option<ViewMode>,
}

impl DisplaySurfaces for MemorySurfaces {
    fn clear_text(&mut self) {
        self.text = TextContent::Empty;
    }

    fn clear_svg(&mut self) {
        self.svg.clear();
        self.svg_size = None;
    }

    fn set_text(&mut self, text: &str) {
        self.text = TextContent::Plain(text.to_string());
    }

    fn set_text_markup(&mut self, markup: &str) {
        self.text = TextContent::Markup(markup.to_string());
    }

    fn set_svg_markup(&mut self, markup: &str) {
        self.svg = markup.to_string();
    }

    fn svg_bounding_box(&self) -> Option<BoundingBox> {
        measure_svg(&self.svg)
    }

    fn set_svg_dimensions(&mut self, width: f64, height: f64) {
        self.svg_size = Some(BoundingBox { width, height });
    }

    fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = Some(mode);
    }
}

/// Box of the first `<svg>` element: its `viewBox` extent, else its
/// `width`/`height` attributes with unit suffixes dropped.
pub fn measure_svg(markup: &str) -> Option<BoundingBox> {
    let opts = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(markup, opts).ok()?;
    let svg = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "svg")?;

    if let Some(view_box) = svg.attribute("viewBox") {
        let parts: Vec<f64> = view_box
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if let [_, _, width, height] = parts.as_slice() {
            if *width > 0.0 && *height > 0.0 {
                return Some(BoundingBox { width: *width, height: *height });
            }
        }
    }

    let width = svg.attribute("width").and_then(parse_length)?;
    let height = svg.attribute("height").and_then(parse_length)?;
    Some(BoundingBox { width, height })
}

fn parse_length(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite() && *v > 0.0)
}
