//! View bindings: the header and sidebar form as the shell sees them.
//!
//! Controls are keyed by option name and typed by the field table, so the
//! crawl and render loops never name individual options.

use std::collections::BTreeMap;
use std::fmt;

use crate::logging::{self, obj, v_str, Domain};
use crate::options::{self, format_number, FieldKind, OptionValue, Options};

/// Views offered by the header, in display order.
pub const VIEWS: &[&str] = &["scope", "op", "code", "graph", "pprof"];

/// Attributes offered by the "select" checkbox group.
pub const SELECTABLE_ATTRIBUTES: &[&str] = &[
    "bytes",
    "peak_bytes",
    "residual_bytes",
    "output_bytes",
    "micros",
    "accelerator_micros",
    "cpu_micros",
    "params",
    "float_ops",
    "occurrence",
    "tensor_value",
    "device",
    "op_types",
    "input_shapes",
];

/// Options without a typed control: the view comes from the header and
/// select from its checkbox group.
const UNCONTROLLED: &[&str] = &["view", "select"];

pub trait ViewBindings {
    /// Crawl the editable controls into `options`.
    fn read_fields_into(&self, options: &mut Options);
    /// Push `options` into the controls and derived display text.
    fn write_fields_from(&mut self, options: &Options);
    /// A user edit of one control.
    fn edit_field(&mut self, name: &str, value: &str) -> Result<(), BindingError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    UnknownControl(String),
    UnknownAttribute(String),
    InvalidValue { control: String, value: String },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::UnknownControl(name) => write!(f, "no control named {:?}", name),
            BindingError::UnknownAttribute(attr) => write!(f, "{:?} is not a selectable attribute", attr),
            BindingError::InvalidValue { control, value } => {
                write!(f, "{:?} is not a valid value for {:?}", value, control)
            }
        }
    }
}

impl std::error::Error for BindingError {}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Checkbox(bool),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub name: &'static str,
    pub value: String,
}

// =============================================================================
// Header
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct HeaderState {
    selected: Option<&'static str>,
}

impl HeaderState {
    pub fn render(&mut self, options: &Options) {
        self.selected = VIEWS.iter().copied().find(|v| *v == options.view);
    }

    pub fn selected(&self) -> Option<&'static str> {
        self.selected
    }
}

// =============================================================================
// Form
// =============================================================================

#[derive(Debug, Clone)]
pub struct FormState {
    controls: BTreeMap<&'static str, Control>,
    select_group: Vec<(&'static str, bool)>,
    data_view: String,
    summary: Vec<(&'static str, OptionValue)>,
}

impl Default for FormState {
    fn default() -> Self {
        let controls = options::fields()
            .iter()
            .filter(|spec| !UNCONTROLLED.contains(&spec.name))
            .map(|spec| {
                let control = match spec.kind {
                    FieldKind::Boolean => Control::Checkbox(false),
                    _ => Control::Text(String::new()),
                };
                (spec.name, control)
            })
            .collect();
        Self {
            controls,
            select_group: SELECTABLE_ATTRIBUTES.iter().map(|a| (*a, false)).collect(),
            data_view: String::new(),
            summary: Vec::new(),
        }
    }
}

impl FormState {
    pub fn control(&self, name: &str) -> Option<&Control> {
        self.controls.get(name)
    }

    /// Attributes whose checkbox is ticked.
    pub fn selected_attributes(&self) -> Vec<String> {
        self.select_group
            .iter()
            .filter(|(_, checked)| *checked)
            .map(|(attr, _)| attr.to_string())
            .collect()
    }

    /// The form's `data-view` attribute.
    pub fn data_view(&self) -> &str {
        &self.data_view
    }

    /// Rows of the option summary; falsy values dropped when `hide_falsy`.
    pub fn summary(&self, hide_falsy: bool) -> Vec<SummaryRow> {
        self.summary
            .iter()
            .filter(|(_, value)| !(hide_falsy && value.is_falsy()))
            .map(|(name, value)| SummaryRow {
                name,
                value: value.to_string(),
            })
            .collect()
    }

    fn crawl_control(name: &'static str, kind: FieldKind, control: &Control) -> Option<OptionValue> {
        match (kind, control) {
            (FieldKind::Boolean, Control::Checkbox(checked)) => Some(OptionValue::Boolean(*checked)),
            (FieldKind::Number, Control::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Some(OptionValue::Number(0.0));
                }
                match text.parse::<f64>() {
                    Ok(n) if n.is_finite() => Some(OptionValue::Number(n)),
                    _ => {
                        logging::debug(
                            Domain::Shell,
                            "unparsed_number",
                            obj(&[("field", v_str(name)), ("text", v_str(text))]),
                        );
                        None
                    }
                }
            }
            (FieldKind::String, Control::Text(text)) => Some(OptionValue::String(text.clone())),
            (FieldKind::StringList, Control::Text(text)) => {
                if text.trim().is_empty() {
                    Some(OptionValue::StringList(Vec::new()))
                } else {
                    Some(OptionValue::StringList(
                        text.split(',').map(|s| s.trim().to_string()).collect(),
                    ))
                }
            }
            _ => None,
        }
    }
}

impl ViewBindings for FormState {
    fn read_fields_into(&self, options: &mut Options) {
        for (name, control) in &self.controls {
            let Some(spec) = options::field(name) else { continue };
            let Some(value) = Self::crawl_control(name, spec.kind, control) else { continue };
            if let Err(err) = options.set(name, value) {
                logging::debug(
                    Domain::Shell,
                    "crawl_rejected",
                    obj(&[("field", v_str(name)), ("error", v_str(&err.to_string()))]),
                );
            }
        }
        options.select = self.selected_attributes();
    }

    fn write_fields_from(&mut self, options: &Options) {
        self.data_view = options.view.clone();
        for (name, control) in self.controls.iter_mut() {
            let Some(value) = options.get(name) else { continue };
            *control = match value {
                OptionValue::Boolean(b) => Control::Checkbox(b),
                OptionValue::Number(n) => Control::Text(format_number(n)),
                OptionValue::String(s) => Control::Text(s),
                OptionValue::StringList(items) => Control::Text(items.join(", ")),
            };
        }
        for (attr, checked) in self.select_group.iter_mut() {
            *checked = options.select.iter().any(|s| s == attr);
        }
        self.summary = options::fields()
            .iter()
            .map(|spec| (spec.name, spec.get(options)))
            .collect();
    }

    fn edit_field(&mut self, name: &str, value: &str) -> Result<(), BindingError> {
        if name == "select" {
            let wanted: Vec<&str> = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if let Some(unknown) = wanted.iter().find(|w| !SELECTABLE_ATTRIBUTES.contains(w)) {
                return Err(BindingError::UnknownAttribute(unknown.to_string()));
            }
            for (attr, checked) in self.select_group.iter_mut() {
                *checked = wanted.contains(attr);
            }
            return Ok(());
        }

        let control = self
            .controls
            .get_mut(name)
            .ok_or_else(|| BindingError::UnknownControl(name.to_string()))?;
        *control = match control {
            Control::Checkbox(_) => match value.trim().to_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Control::Checkbox(true),
                "false" | "0" | "off" | "no" => Control::Checkbox(false),
                _ => {
                    return Err(BindingError::InvalidValue {
                        control: name.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            Control::Text(_) => Control::Text(value.to_string()),
        };
        Ok(())
    }
}

/// Header plus form: everything the shell renders options into.
#[derive(Debug, Clone, Default)]
pub struct MemoryView {
    pub header: HeaderState,
    pub form: FormState,
}

impl ViewBindings for MemoryView {
    fn read_fields_into(&self, options: &mut Options) {
        self.form.read_fields_into(options);
    }

    fn write_fields_from(&mut self, options: &Options) {
        self.header.render(options);
        self.form.write_fields_from(options);
    }

    fn edit_field(&mut self, name: &str, value: &str) -> Result<(), BindingError> {
        self.form.edit_field(name, value)
    }
}
