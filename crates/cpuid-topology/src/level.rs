//! Topology levels and the APIC id layout.
//!
//! Each sub-package level owns a contiguous field of the APIC id, starting
//! where the next finer level ends. Leaves 0x1F and 0x0B report the
//! cumulative shift distance of every level; older processors only expose
//! enough to reconstruct a thread and core field.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cpuid_core::leaf::{
    is_terminal, ADDRESS_LIMITS, DETERMINISTIC_CACHE, EXTENDED_APIC, EXTENDED_TOPOLOGY,
    EXTENDED_TOPOLOGY_V2, VERSION_INFO,
};
use cpuid_core::registers::{bit, bits, Subleaves};
use cpuid_core::Processor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::issue::TopologyIssue;

/// A topology level, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LevelType {
    Thread,
    Core,
    Module,
    Tile,
    Die,
    Node,
    Package,
}

impl LevelType {
    /// Every level, finest first.
    pub const ALL: [LevelType; 7] = [
        LevelType::Thread,
        LevelType::Core,
        LevelType::Module,
        LevelType::Tile,
        LevelType::Die,
        LevelType::Node,
        LevelType::Package,
    ];

    /// Decode the level type field (ecx[15:8]) of leaf 0x0B/0x1F.
    ///
    /// 0 is the terminal marker and other unlisted values are reserved; both
    /// yield `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(LevelType::Thread),
            2 => Some(LevelType::Core),
            3 => Some(LevelType::Module),
            4 => Some(LevelType::Tile),
            5 => Some(LevelType::Die),
            _ => None,
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LevelType::Thread => "thread",
            LevelType::Core => "core",
            LevelType::Module => "module",
            LevelType::Tile => "tile",
            LevelType::Die => "die",
            LevelType::Node => "node",
            LevelType::Package => "package",
        };
        f.write_str(name)
    }
}

/// Where the level layout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologySource {
    /// Leaf 0x1F.
    ExtendedTopologyV2,
    /// Leaf 0x0B.
    ExtendedTopology,
    /// Leaf 1 with leaf 4 (Intel style) or 0x8000_0008 (AMD style).
    Legacy,
    /// No topology information: one flat package.
    Degraded,
}

/// One level's field within the APIC id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LevelDescription {
    pub level: LevelType,
    /// Id bits below this level's field.
    pub offset: u32,
    /// Id bits holding this level's component id.
    pub field_width: u32,
}

impl LevelDescription {
    /// Cumulative shift distance: bits consumed by this level and everything below.
    pub fn shift_distance(&self) -> u32 {
        self.offset + self.field_width
    }

    /// Component id of `apic_id` at this level.
    pub fn component_id(&self, apic_id: u32) -> u32 {
        field(apic_id, self.offset, self.field_width)
    }
}

/// `width` bits of `value` starting at `offset`.
pub(crate) fn field(value: u32, offset: u32, width: u32) -> u32 {
    let shifted = value.checked_shr(offset).unwrap_or(0);
    if width >= 32 {
        shifted
    } else {
        shifted & ((1u32 << width) - 1)
    }
}

/// Smallest `n` with `1 << n >= count`.
pub(crate) fn ceil_log2(count: u32) -> u32 {
    if count <= 1 {
        0
    } else {
        32 - (count - 1).leading_zeros()
    }
}

/// Component ids derived for one APIC id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    pub thread_id: u32,
    pub core_id: u32,
    pub package_id: u32,
    pub component_ids: BTreeMap<LevelType, u32>,
}

/// The resolved id layout for a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LevelLayout {
    pub source: TopologySource,
    /// Defined sub-package levels, finest first, with non-decreasing shifts.
    pub levels: Vec<LevelDescription>,
}

impl LevelLayout {
    pub fn degraded() -> Self {
        Self {
            source: TopologySource::Degraded,
            levels: Vec::new(),
        }
    }

    /// Build from (level, cumulative shift) pairs already in order.
    pub fn from_shifts(source: TopologySource, shifts: &[(LevelType, u32)]) -> Self {
        let mut offset = 0;
        let mut levels = Vec::with_capacity(shifts.len());
        for &(level, shift) in shifts {
            levels.push(LevelDescription {
                level,
                offset,
                field_width: shift - offset,
            });
            offset = shift;
        }
        Self { source, levels }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == TopologySource::Degraded
    }

    fn level(&self, level: LevelType) -> Option<&LevelDescription> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Bits below the package id: the topmost sub-package shift distance.
    pub fn package_shift(&self) -> u32 {
        self.levels.last().map(|l| l.shift_distance()).unwrap_or(0)
    }

    fn thread_shift(&self) -> u32 {
        self.level(LevelType::Thread)
            .map(|l| l.shift_distance())
            .unwrap_or(0)
    }

    /// Every defined level plus the package.
    ///
    /// In degraded mode the package field is empty: every id is package 0.
    pub fn descriptions(&self) -> BTreeMap<LevelType, LevelDescription> {
        let mut map: BTreeMap<_, _> = self.levels.iter().map(|l| (l.level, *l)).collect();
        let top = self.package_shift();
        map.insert(
            LevelType::Package,
            LevelDescription {
                level: LevelType::Package,
                offset: top,
                field_width: if self.is_degraded() { 0 } else { 32 - top },
            },
        );
        map
    }

    /// Cumulative mask width for every level, finest first.
    ///
    /// Undefined levels inherit the width of the next finer defined level;
    /// the package reports the bits below the package id.
    pub fn mask_widths(&self) -> BTreeMap<LevelType, u32> {
        let mut widths = BTreeMap::new();
        let mut current = 0;
        for level in LevelType::ALL {
            if let Some(desc) = self.level(level) {
                current = desc.shift_distance();
            }
            widths.insert(level, current);
        }
        widths
    }

    /// Levels that carry meaning on this machine.
    pub fn valid_levels(&self) -> BTreeSet<LevelType> {
        let mut valid: BTreeSet<_> = self.levels.iter().map(|l| l.level).collect();
        valid.insert(LevelType::Package);
        valid
    }

    /// Derive component ids for one processor.
    pub fn place(&self, apic_id: u32) -> Placement {
        if self.is_degraded() {
            return Placement {
                thread_id: 0,
                core_id: apic_id,
                package_id: 0,
                component_ids: BTreeMap::from([(LevelType::Package, 0)]),
            };
        }

        let thread_shift = self.thread_shift();
        let package_shift = self.package_shift();
        let mut component_ids: BTreeMap<_, _> = self
            .levels
            .iter()
            .map(|l| (l.level, l.component_id(apic_id)))
            .collect();
        let package_id = field(apic_id, package_shift, 32 - package_shift);
        component_ids.insert(LevelType::Package, package_id);

        Placement {
            thread_id: component_ids.get(&LevelType::Thread).copied().unwrap_or(0),
            core_id: field(apic_id, thread_shift, package_shift - thread_shift),
            package_id,
            component_ids,
        }
    }
}

/// Walk an enumerated topology leaf, collecting (level, shift) pairs.
///
/// Stops at the terminal marker. Reserved level types and levels that are
/// out of order, duplicated, or shrink the shift distance are recorded and
/// skipped.
pub(crate) fn enumerate_levels(
    leaf: u32,
    subleaves: &Subleaves,
    issues: &mut Vec<TopologyIssue>,
) -> Vec<(LevelType, u32)> {
    let mut accepted: Vec<(LevelType, u32)> = Vec::new();
    for (&subleaf, regs) in subleaves {
        if is_terminal(leaf, subleaf, regs) {
            break;
        }
        let raw = bits(regs.ecx, 8, 15);
        let shift = bits(regs.eax, 0, 4);

        let Some(level) = LevelType::from_raw(raw) else {
            record(issues, TopologyIssue::UnknownLevel { leaf, subleaf, raw });
            continue;
        };

        if let Some(&(last_level, last_shift)) = accepted.last() {
            if level <= last_level || shift < last_shift {
                record(
                    issues,
                    TopologyIssue::LevelOutOfOrder {
                        leaf,
                        subleaf,
                        level,
                        shift,
                    },
                );
                continue;
            }
        }
        accepted.push((level, shift));
    }
    accepted
}

/// Reconstruct a thread/core layout from pre-0x0B leaves.
pub(crate) fn legacy_layout(cpu: &Processor) -> LevelLayout {
    let Some(version) = cpu.registers(VERSION_INFO, 0) else {
        return LevelLayout::degraded();
    };
    let htt = bit(version.edx, 28);
    let logical_per_package = if htt { bits(version.ebx, 16, 23).max(1) } else { 1 };

    let (package_shift, thread_width) = if cpu.vendor().is_amd_like() {
        let package_shift = match cpu.registers(ADDRESS_LIMITS, 0) {
            Some(regs) => match bits(regs.ecx, 12, 15) {
                0 => ceil_log2(bits(regs.ecx, 0, 7) + 1),
                size => size,
            },
            None => ceil_log2(logical_per_package),
        };
        let threads_per_core = cpu
            .registers(EXTENDED_APIC, 0)
            .map(|regs| bits(regs.ebx, 8, 15) + 1)
            .unwrap_or(1);
        (package_shift, ceil_log2(threads_per_core))
    } else {
        let package_shift = ceil_log2(logical_per_package);
        let cores_per_package = cpu
            .registers(DETERMINISTIC_CACHE, 0)
            .filter(|regs| !is_terminal(DETERMINISTIC_CACHE, 0, regs))
            .map(|regs| bits(regs.eax, 26, 31) + 1)
            .unwrap_or(1);
        let core_width = ceil_log2(cores_per_package).min(package_shift);
        (package_shift, package_shift - core_width)
    };

    // Zero-width fields are left undefined.
    let thread_shift = thread_width.min(package_shift);
    let mut shifts = Vec::with_capacity(2);
    if thread_shift > 0 {
        shifts.push((LevelType::Thread, thread_shift));
    }
    if package_shift > thread_shift {
        shifts.push((LevelType::Core, package_shift));
    }
    LevelLayout::from_shifts(TopologySource::Legacy, &shifts)
}

/// Select the id layout for the machine and the representative it came from.
pub(crate) fn select_layout<'a>(
    processors: impl Iterator<Item = &'a Processor> + Clone,
    issues: &mut Vec<TopologyIssue>,
) -> LevelLayout {
    let sources = [
        (EXTENDED_TOPOLOGY_V2, TopologySource::ExtendedTopologyV2),
        (EXTENDED_TOPOLOGY, TopologySource::ExtendedTopology),
    ];
    for (leaf, source) in sources {
        let representative = processors.clone().find(|cpu| {
            cpu.registers(leaf, 0)
                .is_some_and(|regs| !is_terminal(leaf, 0, regs))
        });
        if let Some(cpu) = representative {
            debug!(leaf, apic_id = cpu.apic_id(), "enumerating topology leaf");
            let shifts = cpu
                .leaves()
                .subleaves(leaf)
                .map(|subleaves| enumerate_levels(leaf, subleaves, issues))
                .unwrap_or_default();
            return LevelLayout::from_shifts(source, &shifts);
        }
    }

    if let Some(cpu) = processors.clone().find(|cpu| cpu.has_leaf(VERSION_INFO)) {
        debug!(apic_id = cpu.apic_id(), "deriving topology from legacy leaves");
        return legacy_layout(cpu);
    }

    info!("no topology leaves reported; using a single flat package");
    LevelLayout::degraded()
}

pub(crate) fn record(issues: &mut Vec<TopologyIssue>, issue: TopologyIssue) {
    warn!("topology inconsistency: {issue}");
    issues.push(issue);
}
