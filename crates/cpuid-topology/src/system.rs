//! The reconstructed machine: hierarchy, flattened views, and caches.
//!
//! Logical cores live once in [`SystemTopology::all_cores`], sorted by APIC
//! id. The package → physical core → logical core maps hold indices into
//! that arena, so the hierarchical and flattened views always describe the
//! same records.

use std::collections::{BTreeMap, BTreeSet};

use cpuid_core::Vendor;
use serde::Serialize;

use crate::cache::Cache;
use crate::issue::TopologyIssue;
use crate::level::{LevelDescription, LevelType, Placement, TopologySource};

/// A processor's view of one cache: which entry of
/// [`SystemTopology::all_caches`] and which physical instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheRef {
    pub cache: usize,
    pub instance: u32,
}

/// One logical processor placed in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LogicalCore {
    /// Key of the processor in the input map.
    pub processor_id: u32,
    /// Id the placement was derived from.
    pub apic_id: u32,
    /// Position within its physical core.
    pub thread_id: u32,
    /// Physical core within the package; spans every level between thread and package.
    pub core_id: u32,
    pub package_id: u32,
    /// Component id at every defined level, plus the package.
    pub component_ids: BTreeMap<LevelType, u32>,
    /// Caches no other processor shares.
    pub non_shared_caches: Vec<CacheRef>,
    /// Caches with at least one other member in the same instance.
    pub shared_caches: Vec<CacheRef>,
}

impl LogicalCore {
    pub(crate) fn placed(processor_id: u32, apic_id: u32, placement: Placement) -> Self {
        Self {
            processor_id,
            apic_id,
            thread_id: placement.thread_id,
            core_id: placement.core_id,
            package_id: placement.package_id,
            component_ids: placement.component_ids,
            non_shared_caches: Vec::new(),
            shared_caches: Vec::new(),
        }
    }

    /// Every cache this processor belongs to, unshared first.
    pub fn caches(&self) -> impl Iterator<Item = &CacheRef> {
        self.non_shared_caches.iter().chain(&self.shared_caches)
    }
}

/// Logical cores of one physical core, keyed by thread id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhysicalCore {
    pub core_id: u32,
    /// Thread id → index into `all_cores`.
    pub logical_cores: BTreeMap<u32, usize>,
}

/// Physical cores of one package, keyed by core id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Package {
    pub package_id: u32,
    pub physical_cores: BTreeMap<u32, PhysicalCore>,
}

/// A complete machine description built by [`crate::build_topology`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemTopology {
    pub(crate) vendor: Vendor,
    pub(crate) source: TopologySource,
    pub(crate) levels: BTreeMap<LevelType, LevelDescription>,
    pub(crate) mask_widths: BTreeMap<LevelType, u32>,
    pub(crate) valid_levels: BTreeSet<LevelType>,
    pub(crate) apic_ids: Vec<u32>,
    pub(crate) packages: BTreeMap<u32, Package>,
    pub(crate) all_cores: Vec<LogicalCore>,
    pub(crate) all_caches: Vec<Cache>,
    pub(crate) issues: Vec<TopologyIssue>,
}

impl SystemTopology {
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn source(&self) -> TopologySource {
        self.source
    }

    pub fn is_degraded(&self) -> bool {
        self.source == TopologySource::Degraded
    }

    /// Field layout of every defined level and the package.
    pub fn levels(&self) -> &BTreeMap<LevelType, LevelDescription> {
        &self.levels
    }

    pub fn level(&self, level: LevelType) -> Option<&LevelDescription> {
        self.levels.get(&level)
    }

    /// Cumulative mask width per level, non-decreasing from thread to package.
    pub fn mask_widths(&self) -> &BTreeMap<LevelType, u32> {
        &self.mask_widths
    }

    pub fn mask_width(&self, level: LevelType) -> u32 {
        self.mask_widths.get(&level).copied().unwrap_or(0)
    }

    pub fn valid_levels(&self) -> &BTreeSet<LevelType> {
        &self.valid_levels
    }

    /// APIC ids of every placed processor, ascending.
    pub fn apic_ids(&self) -> &[u32] {
        &self.apic_ids
    }

    pub fn packages(&self) -> &BTreeMap<u32, Package> {
        &self.packages
    }

    pub fn package(&self, package_id: u32) -> Option<&Package> {
        self.packages.get(&package_id)
    }

    /// Every logical core, sorted by APIC id.
    pub fn all_cores(&self) -> &[LogicalCore] {
        &self.all_cores
    }

    /// Every distinct cache, ordered by level, type, and size.
    pub fn all_caches(&self) -> &[Cache] {
        &self.all_caches
    }

    pub fn issues(&self) -> &[TopologyIssue] {
        &self.issues
    }

    pub fn core_by_apic(&self, apic_id: u32) -> Option<&LogicalCore> {
        self.all_cores
            .binary_search_by_key(&apic_id, |core| core.apic_id)
            .ok()
            .and_then(|index| self.all_cores.get(index))
    }

    /// Logical cores in hierarchy order: package, then core, then thread.
    pub fn walk(&self) -> impl Iterator<Item = &LogicalCore> {
        self.packages
            .values()
            .flat_map(|package| package.physical_cores.values())
            .flat_map(|core| core.logical_cores.values())
            .filter_map(|&index| self.all_cores.get(index))
    }

    /// The cache referenced by `cache_ref`, with the members of its instance.
    pub fn resolve(&self, cache_ref: CacheRef) -> Option<(&Cache, &BTreeSet<u32>)> {
        let cache = self.all_caches.get(cache_ref.cache)?;
        let members = cache.instances.get(&cache_ref.instance)?;
        Some((cache, members))
    }

    /// Whether two processors share at least one physical cache instance.
    pub fn shares_cache(&self, a: u32, b: u32) -> bool {
        self.all_caches.iter().any(|cache| {
            cache
                .instance_of(a)
                .is_some_and(|(_, members)| members.contains(&b))
        })
    }
}
