//! Profile options: the typed record sent to the backend, its defaults, and
//! the field table used by the generic crawl/merge loops.
//!
//! The backend expects snake_case keys, so field names double as wire keys.

use std::fmt;

use serde_json::{Map, Number, Value};

use crate::logging::{self, obj, v_str, Domain};

pub const VIEW_GRAPH: &str = "graph";
pub const VIEW_PPROF: &str = "pprof";

/// Largest magnitude at which an f64 still holds every integer exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Affects how the profile is displayed and which format is requested.
    pub view: String,
    /// Attributes to select.
    pub select: Vec<String>,
    /// Attribute to order results by, descending.
    pub order_by: String,
    /// Show nodes at most this many hops from the starting node.
    pub max_depth: f64,
    pub min_bytes: f64,
    pub min_float_ops: f64,
    pub min_micros: f64,
    pub min_occurrence: f64,
    pub min_params: f64,
    /// Account and display nodes whose types match one of these regexes.
    pub account_type_regexes: Vec<String>,
    /// Only account statistics of displayed ops.
    pub account_displayed_op_only: bool,
    pub hide_name_regexes: Vec<String>,
    pub show_name_regexes: Vec<String>,
    pub start_name_regexes: Vec<String>,
    pub trim_name_regexes: Vec<String>,
    /// Step whose stats are shown; -1 averages all steps.
    pub step: f64,
    /// Keys loaded from an external encoding that no field claims. Kept
    /// verbatim so they survive a decode/encode cycle.
    pub extra: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            view: VIEW_GRAPH.to_string(),
            select: vec!["micros".to_string()],
            order_by: "micros".to_string(),
            max_depth: 10000.0,
            min_bytes: 0.0,
            min_float_ops: 0.0,
            min_micros: 0.0,
            min_occurrence: 0.0,
            min_params: 0.0,
            account_type_regexes: vec![".*".to_string()],
            account_displayed_op_only: true,
            hide_name_regexes: Vec::new(),
            show_name_regexes: vec![".*".to_string()],
            start_name_regexes: vec![".*".to_string()],
            trim_name_regexes: Vec::new(),
            step: -1.0,
            extra: Map::new(),
        }
    }
}

// =============================================================================
// Field values and kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    Number,
    String,
    StringList,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::StringList => "string[]",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Boolean(bool),
    Number(f64),
    String(String),
    StringList(Vec<String>),
}

impl OptionValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            OptionValue::Boolean(_) => FieldKind::Boolean,
            OptionValue::Number(_) => FieldKind::Number,
            OptionValue::String(_) => FieldKind::String,
            OptionValue::StringList(_) => FieldKind::StringList,
        }
    }

    /// Reads a JSON value as `kind`. `None` when the JSON kind does not match.
    pub fn from_json(kind: FieldKind, value: &Value) -> Option<Self> {
        match (kind, value) {
            (FieldKind::Boolean, Value::Bool(b)) => Some(OptionValue::Boolean(*b)),
            (FieldKind::Number, Value::Number(n)) => n.as_f64().map(OptionValue::Number),
            (FieldKind::String, Value::String(s)) => Some(OptionValue::String(s.clone())),
            (FieldKind::StringList, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(OptionValue::StringList),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OptionValue::Boolean(b) => Value::Bool(*b),
            OptionValue::Number(n) => number_to_json(*n),
            OptionValue::String(s) => Value::String(s.clone()),
            OptionValue::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// False, zero and the empty string are falsy. Lists never are.
    pub fn is_falsy(&self) -> bool {
        match self {
            OptionValue::Boolean(b) => !b,
            OptionValue::Number(n) => *n == 0.0 || n.is_nan(),
            OptionValue::String(s) => s.is_empty(),
            OptionValue::StringList(_) => false,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(b) => write!(f, "{}", b),
            OptionValue::Number(n) => write!(f, "{}", format_number(*n)),
            OptionValue::String(s) => write!(f, "{}", s),
            OptionValue::StringList(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

/// Integral values are written without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OptionsError {
    UnknownField(String),
    KindMismatch { field: String, expected: FieldKind },
    NonFinite(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::UnknownField(name) => write!(f, "unknown option {:?}", name),
            OptionsError::KindMismatch { field, expected } => {
                write!(f, "option {:?} expects a {} value", field, expected.as_str())
            }
            OptionsError::NonFinite(name) => write!(f, "option {:?} must be a finite number", name),
        }
    }
}

impl std::error::Error for OptionsError {}

// =============================================================================
// Field table
// =============================================================================

/// One row of the field table: the field's wire name, kind and accessors.
/// Setters receive a value already checked against `kind`.
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    get: fn(&Options) -> OptionValue,
    set: fn(&mut Options, OptionValue),
}

impl FieldSpec {
    pub fn get(&self, options: &Options) -> OptionValue {
        (self.get)(options)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

macro_rules! field {
    ($name:ident, Boolean) => {
        FieldSpec {
            name: stringify!($name),
            kind: FieldKind::Boolean,
            get: |o| OptionValue::Boolean(o.$name),
            set: |o, v| {
                if let OptionValue::Boolean(b) = v {
                    o.$name = b;
                }
            },
        }
    };
    ($name:ident, Number) => {
        FieldSpec {
            name: stringify!($name),
            kind: FieldKind::Number,
            get: |o| OptionValue::Number(o.$name),
            set: |o, v| {
                if let OptionValue::Number(n) = v {
                    o.$name = n;
                }
            },
        }
    };
    ($name:ident, String) => {
        FieldSpec {
            name: stringify!($name),
            kind: FieldKind::String,
            get: |o| OptionValue::String(o.$name.clone()),
            set: |o, v| {
                if let OptionValue::String(s) = v {
                    o.$name = s;
                }
            },
        }
    };
    ($name:ident, StringList) => {
        FieldSpec {
            name: stringify!($name),
            kind: FieldKind::StringList,
            get: |o| OptionValue::StringList(o.$name.clone()),
            set: |o, v| {
                if let OptionValue::StringList(items) = v {
                    o.$name = items;
                }
            },
        }
    };
}

static FIELDS: [FieldSpec; 16] = [
    field!(view, String),
    field!(select, StringList),
    field!(order_by, String),
    field!(max_depth, Number),
    field!(min_bytes, Number),
    field!(min_float_ops, Number),
    field!(min_micros, Number),
    field!(min_occurrence, Number),
    field!(min_params, Number),
    field!(account_type_regexes, StringList),
    field!(account_displayed_op_only, Boolean),
    field!(hide_name_regexes, StringList),
    field!(show_name_regexes, StringList),
    field!(start_name_regexes, StringList),
    field!(trim_name_regexes, StringList),
    field!(step, Number),
];

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.name == name)
}

// =============================================================================
// Options operations
// =============================================================================

impl Options {
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        field(name).map(|spec| spec.get(self))
    }

    pub fn set(&mut self, name: &str, value: OptionValue) -> Result<(), OptionsError> {
        let spec = field(name).ok_or_else(|| OptionsError::UnknownField(name.to_string()))?;
        if value.kind() != spec.kind {
            return Err(OptionsError::KindMismatch {
                field: name.to_string(),
                expected: spec.kind,
            });
        }
        if let OptionValue::Number(n) = value {
            if !n.is_finite() {
                return Err(OptionsError::NonFinite(name.to_string()));
            }
        }
        (spec.set)(self, value);
        Ok(())
    }

    /// Applies the restrictions the current view places on other fields.
    /// Returns true when anything changed.
    pub fn normalize(&mut self) -> bool {
        if self.view != VIEW_GRAPH {
            return false;
        }
        let mut changed = false;
        if self.select != ["micros"] {
            self.select = vec!["micros".to_string()];
            changed = true;
        }
        if self.order_by != "micros" {
            self.order_by = "micros".to_string();
            changed = true;
        }
        changed
    }

    /// Builds options from a decoded JSON object: defaults first, then every
    /// key of `object` on top. Known keys of the wrong kind keep their default.
    pub fn merged_over_defaults(object: &Map<String, Value>) -> Self {
        let mut options = Options::default();
        for (key, value) in object {
            let Some(spec) = field(key) else {
                options.extra.insert(key.clone(), value.clone());
                continue;
            };
            let accepted = OptionValue::from_json(spec.kind, value)
                .map(|v| options.set(key, v).is_ok())
                .unwrap_or(false);
            if !accepted {
                logging::warn(
                    Domain::Options,
                    "kind_mismatch",
                    obj(&[
                        ("field", v_str(key)),
                        ("expected", v_str(spec.kind.as_str())),
                        ("kept", v_str("default")),
                    ]),
                );
            }
        }
        options
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        for spec in fields() {
            map.insert(spec.name.to_string(), spec.get(self).to_json());
        }
        map
    }
}
