use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeclError, DeclResult};

/// Contents of `weft.toml` at the source root. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// How declaration files are found and paired
    pub input: InputConfig,

    /// Names of the generated artifacts
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Suffix that marks a declaration file
    pub declaration_suffix: String,

    /// Suffix of the paired implementation file
    pub implementation_suffix: String,

    /// Directory names never descended into
    pub exclude: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            declaration_suffix: ".bind.toml".to_string(),
            implementation_suffix: ".zig".to_string(),
            exclude: ["node_modules", ".git", "target", "zig-cache", ".zig-cache"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub cpp_file: String,
    pub zig_file: String,
    /// Per-file headers are named `<prefix><Namespace>.h`
    pub header_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cpp_file: "GeneratedBindings.cpp".to_string(),
            zig_file: "bindgen_generated.zig".to_string(),
            header_prefix: "Generated".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub const FILE_NAME: &'static str = "weft.toml";

    /// Reads `weft.toml` from `source_root`, or returns the defaults if there is none.
    pub fn load(source_root: &Path) -> DeclResult<Self> {
        let path = source_root.join(Self::FILE_NAME);
        if !path.is_file() {
            log::debug!("no {} in {}, using defaults", Self::FILE_NAME, source_root.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|source| DeclError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|err| DeclError::Config {
            path,
            message: err.to_string(),
        })
    }

    /// Header file name for a namespace.
    pub fn header_name(&self, namespace: &str) -> String {
        format!("{}{}.h", self.output.header_prefix, namespace)
    }
}
