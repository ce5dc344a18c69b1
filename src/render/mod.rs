//! Render dispatch: one payload, one declared format, one visible surface.

mod memory;
mod trace;

pub use memory::{measure_svg, BoundingBox, MemorySurfaces, TextContent};
pub use trace::{RecordingTraceViewer, TraceFileWriter, TraceSummary};

use crate::format::OutputFormat;
use crate::logging::{self, obj, v_num, v_str, Domain};

/// Value of the container's display-mode attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Text,
    Svg,
    Catapult,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Text => "text",
            ViewMode::Svg => "svg",
            ViewMode::Catapult => "catapult",
        }
    }
}

/// The text and SVG display surfaces plus the shared container attribute.
pub trait DisplaySurfaces {
    fn clear_text(&mut self);
    fn clear_svg(&mut self);
    /// Verbatim text; never interpreted as markup.
    fn set_text(&mut self, text: &str);
    /// Interpreted markup on the text surface.
    fn set_text_markup(&mut self, markup: &str);
    fn set_svg_markup(&mut self, markup: &str);
    /// Bounding box of the inline graphic currently on the SVG surface.
    fn svg_bounding_box(&self) -> Option<BoundingBox>;
    fn set_svg_dimensions(&mut self, width: f64, height: f64);
    fn set_view_mode(&mut self, mode: ViewMode);
}

/// External timeline viewer. Owns whatever it renders into.
pub trait TraceViewer {
    fn render_trace(&mut self, payload: &str);
}

pub struct RenderDispatcher<S, V> {
    surfaces: S,
    viewer: V,
}

impl<S: DisplaySurfaces, V: TraceViewer> RenderDispatcher<S, V> {
    pub fn new(surfaces: S, viewer: V) -> Self {
        Self { surfaces, viewer }
    }

    pub fn surfaces(&self) -> &S {
        &self.surfaces
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn render(&mut self, payload: &str, format: OutputFormat) -> ViewMode {
        self.surfaces.clear_svg();
        self.surfaces.clear_text();

        let mode = match format {
            OutputFormat::Text => {
                self.surfaces.set_view_mode(ViewMode::Text);
                self.surfaces.set_text(payload);
                ViewMode::Text
            }
            OutputFormat::Html => {
                self.surfaces.set_view_mode(ViewMode::Text);
                self.surfaces.set_text_markup(payload);
                ViewMode::Text
            }
            OutputFormat::Svg => {
                self.surfaces.set_view_mode(ViewMode::Svg);
                self.surfaces.set_svg_markup(payload);
                match self.surfaces.svg_bounding_box() {
                    Some(bbox) => self.surfaces.set_svg_dimensions(bbox.width, bbox.height),
                    None => logging::warn(
                        Domain::Render,
                        "svg_unsized",
                        obj(&[("bytes", v_num(payload.len() as f64))]),
                    ),
                }
                ViewMode::Svg
            }
            OutputFormat::Catapult => {
                self.surfaces.set_view_mode(ViewMode::Catapult);
                self.viewer.render_trace(payload);
                ViewMode::Catapult
            }
        };

        logging::info(
            Domain::Render,
            "rendered",
            obj(&[
                ("format", v_str(format.as_str())),
                ("mode", v_str(mode.as_str())),
                ("bytes", v_num(payload.len() as f64)),
            ]),
        );
        mode
    }
}
