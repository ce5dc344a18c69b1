//! Output format derivation and the PPROF-link fallback.

use std::fmt;

use crate::options::{VIEW_GRAPH, VIEW_PPROF};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Svg,
    Catapult,
    Html,
}

impl OutputFormat {
    /// graph → catapult, pprof → svg, anything else → text.
    pub fn for_view(view: &str) -> Self {
        match view {
            VIEW_GRAPH => OutputFormat::Catapult,
            VIEW_PPROF => OutputFormat::Svg,
            _ => OutputFormat::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Svg => "svg",
            OutputFormat::Catapult => "catapult",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SECURE_SCHEME: &str = "https://";

/// An SVG request whose payload is a link to a hosted graph instead of
/// inline markup.
pub fn hosted_graph_url(format: OutputFormat, payload: &str) -> Option<&str> {
    if format != OutputFormat::Svg {
        return None;
    }
    let candidate = payload.trim_end();
    candidate.starts_with(SECURE_SCHEME).then_some(candidate)
}

/// The fixed fragment shown in place of a hosted PPROF graph.
pub fn hosted_graph_notice(url: &str) -> String {
    format!(
        "Your PPROF graph is available <a href=\"{}\" target=\"_blank\">here</a>.",
        escape_attribute(url)
    )
}

fn escape_attribute(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
