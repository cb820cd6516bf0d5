//! `cpuid.toml` configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "cpuid.toml";

/// The whole configuration file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuidConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Selector aliases for `cpuid flag`.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Snapshot used when `--input` is omitted, relative to the config file.
    #[serde(default)]
    pub default: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl CpuidConfig {
    /// Search upward from `start_dir` for `cpuid.toml`, returning the parsed
    /// file and the directory holding it.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let config = Self::parse(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((config, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The selector text for `spec`: its alias target, or `spec` itself.
    pub fn resolve_flag<'a>(&'a self, spec: &'a str) -> &'a str {
        self.flags.get(spec).map(String::as_str).unwrap_or(spec)
    }

    /// Default snapshot path, resolved against `base_dir`.
    pub fn default_input(&self, base_dir: &Path) -> Option<PathBuf> {
        self.input.default.as_ref().map(|path| base_dir.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = CpuidConfig::parse(
            r#"
[input]
default = "dumps/machine.json"

[log]
level = "debug"

[flags]
sse2 = "CPUID.01H:EDX.SSE2[bit 26]"
avx2 = "CPUID.(EAX=07H,ECX=0):EBX.AVX2[bit 5]"
"#,
        )
        .unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.flags.len(), 2);
        assert_eq!(
            config.default_input(Path::new("/srv")),
            Some(PathBuf::from("/srv/dumps/machine.json"))
        );
        assert_eq!(config.resolve_flag("sse2"), "CPUID.01H:EDX.SSE2[bit 26]");
        assert_eq!(config.resolve_flag("CPUID.01H:ECX"), "CPUID.01H:ECX");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = CpuidConfig::parse("").unwrap();
        assert_eq!(config.log.level, "warn");
        assert!(config.flags.is_empty());
        assert!(config.default_input(Path::new(".")).is_none());
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(CpuidConfig::parse("[log\nlevel = ").is_err());
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[log]\nlevel = \"info\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, found_dir) = CpuidConfig::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(found_dir, dir.path());
    }

    #[test]
    fn find_and_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "flags = 3").unwrap();
        let err = CpuidConfig::find_and_load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
