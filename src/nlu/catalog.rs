//! Declarative function catalog for the keyword matcher.
//!
//! The catalog lists, per function, the words that name it and the keywords
//! that select each enum value of its parameters:
//!
//! ```json
//! [{
//!   "name": "ModifyTransform",
//!   "name_synonyms": ["移动", "move"],
//!   "parameters": [
//!     {"name": "objectName", "param_type": "String",
//!      "enum_values": [{"value": "cube", "keywords": ["方块", "cube"]}]},
//!     {"name": "number", "param_type": "Number"}
//!   ]
//! }]
//! ```

use crate::error::{Result, VoiceError};
use crate::functions::{ArgValue, ParamType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One selectable value of an enum parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEnumValue {
    #[serde(alias = "Value")]
    pub value: ArgValue,
    #[serde(default, alias = "Keywords")]
    pub keywords: Vec<String>,
}

/// One parameter of a catalog function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogParameter {
    #[serde(alias = "ParamName")]
    pub name: String,
    #[serde(alias = "ParamType", deserialize_with = "de_param_type")]
    pub param_type: ParamType,
    #[serde(default, alias = "EnumValues", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<CatalogEnumValue>,
}

/// One function entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogFunction {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "NameSynonyms")]
    pub name_synonyms: Vec<String>,
    #[serde(default, alias = "Parameters")]
    pub parameters: Vec<CatalogParameter>,
}

impl CatalogFunction {
    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&CatalogParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// The full catalog, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionCatalog {
    pub functions: Vec<CatalogFunction>,
}

impl FunctionCatalog {
    /// Parse a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] on malformed JSON or duplicate function names.
    pub fn from_json(text: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(text)
            .map_err(|e| VoiceError::Config(format!("invalid function catalog: {e}")))?;
        catalog.check_unique()?;
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Io`] if the file cannot be read, or
    /// [`VoiceError::Config`] if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn check_unique(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for f in &self.functions {
            if !seen.insert(f.name.as_str()) {
                return Err(VoiceError::Config(format!(
                    "duplicate function '{}' in catalog",
                    f.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&CatalogFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Every synonym and enum keyword, for tokenizer dictionaries.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut words = Vec::new();
        for f in &self.functions {
            words.extend(f.name_synonyms.iter().cloned());
            for p in &f.parameters {
                for v in &p.enum_values {
                    words.extend(v.keywords.iter().cloned());
                }
            }
        }
        words.sort();
        words.dedup();
        words
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn de_param_type<'de, D>(deserializer: D) -> std::result::Result<ParamType, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.to_ascii_lowercase().as_str() {
        "string" => Ok(ParamType::String),
        "number" => Ok(ParamType::Number),
        "boolean" | "bool" => Ok(ParamType::Boolean),
        other => Err(serde::de::Error::custom(format!(
            "unknown param_type '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    const SAMPLE: &str = r##"[
      {"name": "SetTimeOfDay", "name_synonyms": ["时间"],
       "parameters": [{"name": "timeOfDay", "param_type": "Number"}]},
      {"Name": "ChangeObjectColor", "NameSynonyms": ["颜色"],
       "Parameters": [{"ParamName": "hexColor", "ParamType": "string",
         "EnumValues": [{"Value": "#FF0000", "Keywords": ["红色", "red"]}]}]}
    ]"##;

    #[test]
    fn parses_both_key_styles() {
        let catalog = FunctionCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        let color = catalog.function("ChangeObjectColor").unwrap();
        let hex = color.parameter("hexColor").unwrap();
        assert_eq!(hex.param_type, ParamType::String);
        assert_eq!(hex.enum_values[0].value, ArgValue::from("#FF0000"));
        assert_eq!(
            catalog.function("SetTimeOfDay").unwrap().parameters[0].param_type,
            ParamType::Number
        );
    }

    #[test]
    fn vocabulary_is_sorted_and_unique() {
        let catalog = FunctionCatalog::from_json(SAMPLE).unwrap();
        let vocab = catalog.vocabulary();
        assert!(vocab.contains(&"红色".to_owned()));
        assert!(vocab.contains(&"时间".to_owned()));
        let mut sorted = vocab.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(vocab, sorted);
    }

    #[test]
    fn rejects_unknown_param_type() {
        let text = r#"[{"name": "F", "parameters": [{"name": "p", "param_type": "Date"}]}]"#;
        match FunctionCatalog::from_json(text) {
            Err(VoiceError::Config(msg)) => assert!(msg.contains("Date") || msg.contains("date")),
            other => unreachable!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_functions() {
        let text = r#"[{"name": "F"}, {"name": "F"}]"#;
        assert!(FunctionCatalog::from_json(text).is_err());
    }
}
