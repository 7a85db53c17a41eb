//! Compiler configuration.
//!
//! A `CompilerConfig` collects everything the driver needs beyond the input
//! path: which C compiler to invoke, where the cache lives, and the
//! diagnostic strictness switches. Values can be loaded from a TOML file
//! and individually overridden by CLI flags.
//!
//! ```toml
//! # rill.toml
//! cc = "clang"
//! cache-dir = "/tmp/rill-cache"
//! strict-undefined = true
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompilerConfig {
    /// C compiler command used to link generated programs.
    pub cc: String,
    /// Cache directory override; defaults to `~/.rill`.
    pub cache_dir: Option<PathBuf>,
    /// Treat unresolved names as compile errors instead of deferring them
    /// to a runtime "name is not defined" failure.
    pub strict_undefined: bool,
    /// Report the path of the lowered C file after a build.
    pub keep_c: bool,
    /// Print per-phase timing to stderr. CLI-only; not read from files.
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            cc: "cc".to_string(),
            cache_dir: None,
            strict_undefined: false,
            keep_c: false,
            verbose: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid configuration: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("could not read configuration {}: {}", path.display(), e))?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.cc, "cc");
        assert!(config.cache_dir.is_none());
        assert!(!config.strict_undefined);
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_toml(
            "cc = \"clang\"\ncache-dir = \"/tmp/x\"\nstrict-undefined = true\n",
        )
        .unwrap();
        assert_eq!(config.cc, "clang");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/x")));
        assert!(config.strict_undefined);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = CompilerConfig::from_toml("cc = \"gcc\"\n").unwrap();
        assert_eq!(config.cc, "gcc");
        assert!(!config.strict_undefined);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(CompilerConfig::from_toml("optimize = true\n").is_err());
    }
}
