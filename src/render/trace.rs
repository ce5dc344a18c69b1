use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::TraceViewer;
use crate::logging::{self, obj, v_num, v_str, Domain};

/// Shape of a Chrome trace: bare event array or `{"traceEvents": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    pub events: usize,
    pub processes: usize,
}

impl TraceSummary {
    pub fn parse(payload: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(payload).ok()?;
        let events = match &value {
            Value::Array(events) => events,
            Value::Object(map) => map.get("traceEvents")?.as_array()?,
            _ => return None,
        };
        let pids: BTreeSet<String> = events
            .iter()
            .filter_map(|e| e.get("pid"))
            .map(|pid| pid.to_string())
            .collect();
        Some(Self {
            events: events.len(),
            processes: pids.len(),
        })
    }
}

/// Keeps the last trace handed over.
#[derive(Debug, Clone, Default)]
pub struct RecordingTraceViewer {
    pub payload: Option<String>,
    pub summary: Option<TraceSummary>,
    pub renders: usize,
}

impl TraceViewer for RecordingTraceViewer {
    fn render_trace(&mut self, payload: &str) {
        self.payload = Some(payload.to_string());
        self.summary = TraceSummary::parse(payload);
        self.renders += 1;
    }
}

/// Writes each trace to `<dir>/trace.json` for loading into a trace viewer.
#[derive(Debug, Clone)]
pub struct TraceFileWriter {
    path: PathBuf,
    pub last_summary: Option<TraceSummary>,
}

impl TraceFileWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("trace.json"),
            last_summary: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceViewer for TraceFileWriter {
    fn render_trace(&mut self, payload: &str) {
        self.last_summary = TraceSummary::parse(payload);
        let written = self
            .path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&self.path, payload));
        match written {
            Ok(()) => logging::info(
                Domain::Render,
                "trace_written",
                obj(&[
                    ("path", v_str(&self.path.to_string_lossy())),
                    (
                        "events",
                        v_num(self.last_summary.as_ref().map_or(0, |s| s.events) as f64),
                    ),
                ]),
            ),
            Err(err) => logging::error(
                Domain::Render,
                "trace_write_failed",
                obj(&[
                    ("path", v_str(&self.path.to_string_lossy())),
                    ("error", v_str(&err.to_string())),
                ]),
            ),
        }
    }
}
