//! Script configuration
//!
//! Read from TOML:
//!
//! ```toml
//! script = "scripts/update.sb"
//! libs = ["base", "math", "string"]
//! max_call_depth = 100
//! ```
//!
//! Every field is optional. The defaults open all libraries and use the
//! runtime's default call depth.

use crate::error::ScriptError;
use serde::{Deserialize, Serialize};
use stackbind_runtime::{DEFAULT_MAX_CALL_DEPTH, Libs, MAX_CALL_DEPTH};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptConfig {
    /// Script file loaded by `compile`
    pub script: Option<PathBuf>,
    /// Libraries to open, by name
    pub libs: Vec<String>,
    /// Nesting limit for calls inside the runtime
    pub max_call_depth: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            script: None,
            libs: vec!["all".to_string()],
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl ScriptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ScriptError> {
        let config: ScriptConfig = toml::from_str(toml_str)
            .map_err(|e| ScriptError::Config(format!("Failed to parse script config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a relative `script` path resolves against the
    /// file's directory
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScriptError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(script) = config.script.take() {
            let resolved = match path.parent() {
                Some(dir) if script.is_relative() => dir.join(script),
                _ => script,
            };
            config.script = Some(resolved);
        }
        Ok(config)
    }

    pub fn with_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    pub fn with_libs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Selected libraries as a runtime mask
    pub fn lib_mask(&self) -> Result<Libs, ScriptError> {
        Libs::from_names(&self.libs).map_err(ScriptError::Config)
    }

    /// Check the library names and the call depth range
    pub fn validate(&self) -> Result<(), ScriptError> {
        self.lib_mask()?;
        if self.max_call_depth == 0 || self.max_call_depth > MAX_CALL_DEPTH {
            return Err(ScriptError::Config(format!(
                "max_call_depth must be between 1 and {}",
                MAX_CALL_DEPTH
            )));
        }
        Ok(())
    }
}
