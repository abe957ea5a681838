//! YAML loader with custom tag support
//!
//! Supported tags:
//! - `!include path` - Include another YAML file (relative to the including file)
//! - `!env_var VAR [default]` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that resolves `!include` and `!env_var` tags
pub struct YamlLoader {
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    pub fn new() -> Self {
        Self {
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    ///
    /// `source_path` is used for error messages and to resolve relative includes.
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    result.insert(k, self.process_value(v, source_path)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!include" => self.process_include(tagged.value, source_path),
            "!env_var" => process_env_var(tagged.value),
            _ => Err(ConfigError::invalid(tag, "is not a supported YAML tag")),
        }
    }

    fn process_include(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        let Value::String(relative) = value else {
            return Err(ConfigError::invalid("!include", "path must be a string"));
        };

        let base = source_path.parent().unwrap_or_else(|| Path::new("."));
        let path = base.join(relative);
        if !path.exists() {
            return Err(ConfigError::IncludeNotFound { path });
        }

        debug!("Including file: {:?}", path);
        self.load_file(&path)
    }
}

impl Default for YamlLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// `!env_var NAME` or `!env_var NAME default`
fn process_env_var(value: Value) -> ConfigResult<Value> {
    let Value::String(raw) = value else {
        return Err(ConfigError::invalid("!env_var", "variable name must be a string"));
    };

    let mut parts = raw.splitn(2, char::is_whitespace);
    let var = parts.next().unwrap_or_default().to_string();
    let default = parts.next().map(str::trim);

    let resolved = match (std::env::var(&var), default) {
        (Ok(v), _) => v,
        (Err(_), Some(d)) => d.to_string(),
        (Err(_), None) => return Err(ConfigError::EnvVarNotFound { var }),
    };

    // Re-parse so numbers and booleans keep their YAML type
    Ok(serde_yaml::from_str(&resolved).unwrap_or(Value::String(resolved)))
}

/// Load a YAML file, resolving custom tags
pub fn load_yaml(path: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new().load_file(path)
}

/// Load YAML from a string, resolving custom tags relative to the working directory
pub fn load_yaml_string(content: &str) -> ConfigResult<Value> {
    YamlLoader::new().load_string(content, Path::new("./<string>"))
}
