//! Inspector parameter schema
//!
//! Every module declares a list of [`ParamSpec`] entries. An external
//! inspector widget renders them and calls back into the registry with
//! `(param, value)` pairs; the core only validates and dispatches.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A parameter value as it travels between the inspector and a module.
///
/// Colors are carried as `#rrggbb` text, matching the persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view. Booleans coerce to 0/1 the way the original toggles did.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(_) => None,
        }
    }

    /// Boolean view. Any non-zero number counts as true.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Widget kind for a parameter control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamKind {
    Slider { min: f64, max: f64, step: f64 },
    Toggle,
    Color,
    Select { options: Vec<String> },
}

/// One inspector control: display label, target param name, widget kind,
/// default value, and an optional hidden flag (tuning-only params).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub label: String,
    pub param: String,
    #[serde(flatten)]
    pub kind: ParamKind,
    pub value: ParamValue,
    #[serde(default)]
    pub hidden: bool,
}

impl ParamSpec {
    pub fn slider(label: &str, param: &str, min: f64, max: f64, step: f64, value: f64) -> Self {
        Self {
            label: label.to_string(),
            param: param.to_string(),
            kind: ParamKind::Slider { min, max, step },
            value: ParamValue::Number(value),
            hidden: false,
        }
    }

    pub fn toggle(label: &str, param: &str, value: bool) -> Self {
        Self {
            label: label.to_string(),
            param: param.to_string(),
            kind: ParamKind::Toggle,
            value: ParamValue::Bool(value),
            hidden: false,
        }
    }

    pub fn color(label: &str, param: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            param: param.to_string(),
            kind: ParamKind::Color,
            value: ParamValue::Text(value.to_string()),
            hidden: false,
        }
    }

    pub fn select(label: &str, param: &str, options: &[&str], value: &str) -> Self {
        Self {
            label: label.to_string(),
            param: param.to_string(),
            kind: ParamKind::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            value: ParamValue::Text(value.to_string()),
            hidden: false,
        }
    }

    /// Mark the spec as hidden from the rendered inspector.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Clamp an incoming value to the spec's bounds where they exist.
    pub fn clamp(&self, value: ParamValue) -> ParamValue {
        match (&self.kind, &value) {
            (ParamKind::Slider { min, max, .. }, ParamValue::Number(n)) => {
                ParamValue::Number(n.clamp(*min, *max))
            }
            (ParamKind::Select { options }, ParamValue::Text(s)) if !options.contains(s) => {
                self.value.clone()
            }
            _ => value,
        }
    }
}

/// Per-module bag of last-applied parameter values.
pub type ParamBag = HashMap<String, ParamValue>;
