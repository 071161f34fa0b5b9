//! Name-keyed function registry shared by the matcher and the tool-call executor.
//!
//! The [`FunctionRegistry`] holds registered functions, provides lookup by
//! name, and exports JSON schemas for chat-completion tool calls. Lookups hand
//! out `Arc` snapshots, so a dispatch already in flight is unaffected by a
//! later [`register()`](FunctionRegistry::register) or
//! [`clear()`](FunctionRegistry::clear).

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::json;
use tracing::debug;

use super::types::{Arguments, FunctionMeta};
use crate::error::{Result, VoiceError};

/// Registry of callable functions.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<FunctionMeta>>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<FunctionMeta>>> {
        match self.functions.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<FunctionMeta>>> {
        match self.functions.write() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }

    /// Register a function. Replaces any existing function with the same name.
    pub fn register(&self, meta: FunctionMeta) {
        debug!(function = %meta.name, params = meta.parameters.len(), "registering function");
        self.write().insert(meta.name.clone(), Arc::new(meta));
    }

    /// Get a function by name.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] when no function has that name.
    pub fn get(&self, name: &str) -> Result<Arc<FunctionMeta>> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| VoiceError::Dispatch(format!("unregistered function: {name}")))
    }

    /// Check if a function is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Remove every function. Safe to call repeatedly.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshots of all functions, sorted by name.
    pub fn all(&self) -> Vec<Arc<FunctionMeta>> {
        let mut all: Vec<Arc<FunctionMeta>> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Human-readable catalog: `[{name, description, parameters}]`.
    pub fn describe(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .all()
            .iter()
            .map(|f| {
                let params: Vec<serde_json::Value> = f
                    .parameters
                    .iter()
                    .map(|(name, p)| {
                        let mut entry = json!({
                            "name": name,
                            "type": p.param_type.json_type(),
                            "description": p.description,
                        });
                        if let Some(values) = &p.enum_values {
                            entry["enum"] = json!(values);
                        }
                        entry
                    })
                    .collect();
                json!({
                    "name": f.name,
                    "description": f.description,
                    "parameters": params,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }

    /// Export OpenAI-style tool definitions for chat-completion requests.
    ///
    /// Every declared parameter is listed as required.
    pub fn schemas_for_api(&self) -> Vec<serde_json::Value> {
        self.all()
            .iter()
            .map(|f| {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::with_capacity(f.parameters.len());
                for (name, p) in &f.parameters {
                    let mut prop = json!({
                        "type": p.param_type.json_type(),
                        "description": p.description,
                    });
                    if let Some(values) = &p.enum_values {
                        prop["enum"] = json!(values);
                    }
                    properties.insert(name.clone(), prop);
                    required.push(name.clone());
                }
                json!({
                    "type": "function",
                    "function": {
                        "name": f.name,
                        "description": f.description,
                        "parameters": {
                            "type": "object",
                            "properties": properties,
                            "required": required,
                        },
                    },
                })
            })
            .collect()
    }

    /// Resolve and invoke a function.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] for an unknown name, or whatever the
    /// handler returns.
    pub fn execute(&self, name: &str, args: &Arguments) -> Result<String> {
        let meta = self.get(name)?;
        debug!(function = %name, args = args.len(), "executing function");
        meta.call(args)
    }

    /// Parse a JSON object of arguments and invoke the function.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] for an unknown name or malformed
    /// arguments, or whatever the handler returns.
    pub fn execute_json(&self, name: &str, arguments_json: &str) -> Result<String> {
        let meta = self.get(name)?;
        let args = Arguments::from_json_str(arguments_json)?;
        debug!(function = %name, args = args.len(), "executing function");
        meta.call(&args)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}
