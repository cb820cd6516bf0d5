//! CLI command implementations.

pub mod flag;
pub mod leaves;
pub mod topology;
pub mod vendor;

use std::path::Path;

use anyhow::{Context, Result};
use cpuid_core::snapshot::load_snapshot;
use cpuid_core::ProcessorMap;
use serde::Serialize;

/// Load a native snapshot file.
pub fn load_processors(input: &Path) -> Result<ProcessorMap> {
    load_snapshot(input).with_context(|| format!("loading snapshot {}", input.display()))
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use tempfile::TempDir;

    /// Two SMT siblings on an Intel part, one core level, private L1d.
    pub const MACHINE: &str = r#"{
  "processors": [
    {
      "apic-id": 0,
      "leaves": {
        "0": { "0": [31, 1970169159, 1818588270, 1231384169] },
        "1": { "0": [329300, 133120, 0, 1] },
        "4": { "0": [289, 29360191, 63, 0], "1": [0, 0, 0, 0] },
        "11": { "0": [1, 2, 256, 0], "1": [1, 2, 513, 0], "2": [0, 0, 2, 0] }
      }
    },
    {
      "apic-id": 1,
      "leaves": {
        "0": { "0": [31, 1970169159, 1818588270, 1231384169] },
        "1": { "0": [329300, 16910336, 0, 0] },
        "4": { "0": [289, 29360191, 63, 0], "1": [0, 0, 0, 0] },
        "11": { "0": [1, 2, 256, 1], "1": [1, 2, 513, 1], "2": [0, 0, 2, 1] }
      }
    }
  ]
}"#;

    pub fn write_machine(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("machine.json");
        std::fs::write(&path, MACHINE).unwrap();
        path
    }
}
