//! Recoverable topology inconsistencies.

use serde::Serialize;

use crate::cache::CacheType;
use crate::level::LevelType;

/// A problem found while building a topology.
///
/// Issues never abort a build; the affected record or subleaf is skipped and
/// the issue is kept on the resulting snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum TopologyIssue {
    #[error("leaf {leaf:#x} subleaf {subleaf}: reserved level type {raw}")]
    UnknownLevel { leaf: u32, subleaf: u32, raw: u32 },

    #[error("leaf {leaf:#x} subleaf {subleaf}: {level} level at shift {shift} is out of order")]
    LevelOutOfOrder {
        leaf: u32,
        subleaf: u32,
        level: LevelType,
        shift: u32,
    },

    #[error(
        "processors {dropped} and {kept} both report APIC id {apic_id:#x} (package {package_id}, core {core_id}, thread {thread_id}); keeping {kept}"
    )]
    DuplicateKey {
        kept: u32,
        dropped: u32,
        apic_id: u32,
        package_id: u32,
        core_id: u32,
        thread_id: u32,
    },

    #[error(
        "APIC id {apic_id:#x}: level {level} {cache_type} cache shares {found} id bits, first seen with {expected}"
    )]
    CacheShapeMismatch {
        apic_id: u32,
        level: u32,
        cache_type: CacheType,
        expected: u32,
        found: u32,
    },
}
