//! Function metadata, parameter schema, and loosely typed arguments.

use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single argument value as produced by the matcher or parsed from model JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Boolean flag.
    Bool(bool),
    /// Any numeric value.
    Number(f64),
    /// Free text or an enum member.
    String(String),
}

impl ArgValue {
    /// Convert a JSON value, rejecting arrays, objects, and null.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Declared type of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    /// Text, possibly constrained to an enum.
    String,
    /// Integer or floating point.
    Number,
    /// `true` / `false`.
    Boolean,
}

impl ParamType {
    /// JSON Schema type name.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Schema of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    pub param_type: ParamType,
    pub description: String,
    pub enum_values: Option<Vec<String>>,
}

impl ParameterMeta {
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            enum_values: None,
        }
    }

    /// Restrict the parameter to a fixed set of values.
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Handler signature shared by every registered function.
pub type Handler = Arc<dyn Fn(&Arguments) -> Result<String> + Send + Sync>;

/// A callable function: name, description, ordered parameters, and handler.
#[derive(Clone)]
pub struct FunctionMeta {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order.
    pub parameters: Vec<(String, ParameterMeta)>,
    pub handler: Handler,
}

impl FunctionMeta {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Arguments) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Append a parameter. Later parameters with the same name replace earlier ones.
    pub fn with_param(mut self, name: impl Into<String>, meta: ParameterMeta) -> Self {
        let name = name.into();
        if let Some(slot) = self.parameters.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = meta;
        } else {
            self.parameters.push((name, meta));
        }
        self
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParameterMeta> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    /// Invoke the handler.
    pub fn call(&self, args: &Arguments) -> Result<String> {
        (self.handler)(args)
    }
}

impl fmt::Debug for FunctionMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionMeta")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Named argument values with coercing accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.values.iter()
    }

    /// Parse a JSON object string (as sent in a tool call).
    ///
    /// An empty or whitespace-only string yields no arguments. Nested arrays,
    /// objects, and nulls are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] when the text is not a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| VoiceError::Dispatch(format!("invalid arguments JSON: {e}")))?;
        let serde_json::Value::Object(map) = value else {
            return Err(VoiceError::Dispatch(
                "arguments must be a JSON object".to_owned(),
            ));
        };
        let mut args = Self::default();
        for (key, value) in &map {
            if let Some(v) = ArgValue::from_json(value) {
                args.values.insert(key.clone(), v);
            }
        }
        Ok(args)
    }

    fn required(&self, name: &str) -> Result<&ArgValue> {
        self.values
            .get(name)
            .ok_or_else(|| VoiceError::Dispatch(format!("missing argument '{name}'")))
    }

    /// Numeric value; numeric strings are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] when missing or not numeric.
    pub fn number(&self, name: &str) -> Result<f64> {
        match self.required(name)? {
            ArgValue::Number(n) => Ok(*n),
            ArgValue::String(s) => s.trim().parse::<f64>().map_err(|_| {
                VoiceError::Dispatch(format!("argument '{name}' is not a number: {s}"))
            }),
            ArgValue::Bool(b) => Err(VoiceError::Dispatch(format!(
                "argument '{name}' is not a number: {b}"
            ))),
        }
    }

    /// Text value; numbers and booleans are rendered.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] when missing.
    pub fn string(&self, name: &str) -> Result<String> {
        Ok(self.required(name)?.to_string())
    }

    /// Boolean value; `"true"` / `"false"` strings are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] when missing or not boolean.
    pub fn boolean(&self, name: &str) -> Result<bool> {
        match self.required(name)? {
            ArgValue::Bool(b) => Ok(*b),
            ArgValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            ArgValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(VoiceError::Dispatch(format!(
                "argument '{name}' is not a boolean: {other}"
            ))),
        }
    }
}

impl From<BTreeMap<String, ArgValue>> for Arguments {
    fn from(values: BTreeMap<String, ArgValue>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, ArgValue)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (String, ArgValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn arg_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            ArgValue::from("cube"),
            ArgValue::from(2.5),
            ArgValue::from(true),
        ])
        .unwrap();
        assert_eq!(json, r#"["cube",2.5,true]"#);

        let back: Vec<ArgValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[1], ArgValue::Number(2.5));
    }

    #[test]
    fn number_accepts_numeric_strings() {
        let args = Arguments::new().with("a", 3.0).with("b", "4.5").with("c", "abc");
        assert_eq!(args.number("a").unwrap(), 3.0);
        assert_eq!(args.number("b").unwrap(), 4.5);
        match args.number("c") {
            Err(VoiceError::Dispatch(msg)) => assert!(msg.contains("'c'")),
            other => unreachable!("expected dispatch error, got {other:?}"),
        }
    }

    #[test]
    fn string_renders_scalars() {
        let args = Arguments::new().with("n", 12.0).with("b", false);
        assert_eq!(args.string("n").unwrap(), "12");
        assert_eq!(args.string("b").unwrap(), "false");
    }

    #[test]
    fn boolean_accepts_text_forms() {
        let args = Arguments::new().with("x", "TRUE").with("y", 1.0);
        assert!(args.boolean("x").unwrap());
        assert!(args.boolean("y").is_err());
    }

    #[test]
    fn missing_argument_is_dispatch_error() {
        let args = Arguments::new();
        match args.string("objectName") {
            Err(VoiceError::Dispatch(msg)) => assert!(msg.contains("objectName")),
            other => unreachable!("expected dispatch error, got {other:?}"),
        }
    }

    #[test]
    fn from_json_str_parses_object() {
        let args =
            Arguments::from_json_str(r#"{"objectName":"cube","number":2,"extra":[1]}"#).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.number("number").unwrap(), 2.0);
        assert!(!args.contains("extra"));

        assert!(Arguments::from_json_str("").unwrap().is_empty());
        assert!(Arguments::from_json_str("[1,2]").is_err());
        assert!(Arguments::from_json_str("{not json").is_err());
    }

    #[test]
    fn with_param_keeps_declaration_order() {
        let meta = FunctionMeta::new("F", "test", |_| Ok(String::new()))
            .with_param("b", ParameterMeta::new(ParamType::String, "first"))
            .with_param("a", ParameterMeta::new(ParamType::Number, "second"))
            .with_param("b", ParameterMeta::new(ParamType::Boolean, "replaced"));
        let names: Vec<&str> = meta.parameters.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(meta.param("b").unwrap().param_type, ParamType::Boolean);
    }
}
