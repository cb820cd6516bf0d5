//! Native snapshot format: load, parse, and serialize register dumps.
//!
//! A snapshot is a JSON document listing every logical processor's raw
//! registers. Vendor and model are never stored; they are decoded again when
//! the records are rebuilt.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::processor::{Processor, ProcessorMap};
use crate::registers::Leaves;

/// On-disk shape of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotDocument {
    pub processors: Vec<ProcessorEntry>,
}

/// One processor in a snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProcessorEntry {
    /// Explicit APIC id; derived from the registers when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apic_id: Option<u32>,
    pub leaves: Leaves,
}

/// Load processors from a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<ProcessorMap> {
    if !path.exists() {
        return Err(CoreError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_snapshot(&content)
}

/// Parse processors from a snapshot JSON string.
pub fn parse_snapshot(json: &str) -> Result<ProcessorMap> {
    let document: SnapshotDocument = serde_json::from_str(json)?;
    build_processors(document)
}

/// Rebuild processor records from a parsed document.
///
/// Two entries resolving to the same APIC id make the snapshot invalid.
pub fn build_processors(document: SnapshotDocument) -> Result<ProcessorMap> {
    let mut processors = ProcessorMap::new();
    for entry in document.processors {
        let cpu = match entry.apic_id {
            Some(id) => Processor::new(id, entry.leaves),
            None => Processor::from_leaves(entry.leaves),
        };
        let id = cpu.apic_id();
        if processors.insert(id, cpu).is_some() {
            return Err(CoreError::InvalidSnapshot {
                detail: format!("duplicate APIC id {id}"),
            });
        }
    }
    debug!(processors = processors.len(), "parsed snapshot");
    Ok(processors)
}

/// Convert processors back into the document shape.
pub fn to_document(processors: &ProcessorMap) -> SnapshotDocument {
    SnapshotDocument {
        processors: processors
            .values()
            .map(|cpu| ProcessorEntry {
                apic_id: Some(cpu.apic_id()),
                leaves: cpu.leaves().clone(),
            })
            .collect(),
    }
}

/// Serialize processors to pretty JSON.
pub fn snapshot_to_json(processors: &ProcessorMap) -> Result<String> {
    let json = serde_json::to_string_pretty(&to_document(processors))?;
    Ok(json)
}

/// Write processors to a snapshot file.
pub fn save_snapshot(path: &Path, processors: &ProcessorMap) -> Result<()> {
    std::fs::write(path, snapshot_to_json(processors)?)?;
    Ok(())
}
