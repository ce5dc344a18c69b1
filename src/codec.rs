//! Options ⇄ JSON text ⇄ address-bar fragment, plus the backend request path.

use std::fmt;

use serde_json::Value;
use url::form_urlencoded;

use crate::logging::{self, obj, v_str, Domain};
use crate::options::Options;

pub const PROFILE_ROUTE: &str = "/profile";
pub const CHECK_ROUTE: &str = "/check";

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    NotAnObject(&'static str),
    Percent(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(err) => write!(f, "malformed options json: {}", err),
            DecodeError::NotAnObject(kind) => write!(f, "options must be an object, got {}", kind),
            DecodeError::Percent(err) => write!(f, "malformed fragment encoding: {}", err),
        }
    }
}

impl std::error::Error for DecodeError {}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsCodec;

impl OptionsCodec {
    pub fn new() -> Self {
        Self
    }

    /// Strict decode: the text must be a JSON object.
    pub fn try_decode(&self, raw: &str) -> Result<Options, DecodeError> {
        let value: Value = serde_json::from_str(raw).map_err(DecodeError::Json)?;
        match value {
            Value::Object(map) => Ok(Options::merged_over_defaults(&map)),
            other => Err(DecodeError::NotAnObject(json_kind(&other))),
        }
    }

    /// Never fails: anything that is not a JSON object yields the defaults.
    pub fn decode(&self, raw: &str) -> Options {
        match self.try_decode(raw) {
            Ok(options) => options,
            Err(err) => {
                if !raw.trim().is_empty() {
                    logging::debug(
                        Domain::Options,
                        "decode_fallback",
                        obj(&[("error", v_str(&err.to_string()))]),
                    );
                }
                Options::default()
            }
        }
    }

    /// Canonical JSON with sorted keys.
    pub fn encode(&self, options: &Options) -> String {
        Value::Object(options.to_json_map()).to_string()
    }

    pub fn encode_fragment(&self, options: &Options) -> String {
        urlencoding::encode(&self.encode(options)).into_owned()
    }

    /// Accepts the fragment with or without its leading `#`.
    pub fn try_decode_fragment(&self, fragment: &str) -> Result<Options, DecodeError> {
        let body = fragment.strip_prefix('#').unwrap_or(fragment);
        let text = urlencoding::decode(body).map_err(|e| DecodeError::Percent(e.to_string()))?;
        self.try_decode(&text)
    }

    pub fn decode_fragment(&self, fragment: &str) -> Options {
        match self.try_decode_fragment(fragment) {
            Ok(options) => options,
            Err(err) => {
                if !fragment.trim_start_matches('#').is_empty() {
                    logging::debug(
                        Domain::Options,
                        "fragment_fallback",
                        obj(&[("error", v_str(&err.to_string()))]),
                    );
                }
                Options::default()
            }
        }
    }

    /// `/profile?options=<json>`, form-encoded.
    pub fn profile_path(&self, options: &Options) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("options", &self.encode(options))
            .finish();
        format!("{}?{}", PROFILE_ROUTE, query)
    }
}
