//! Topology construction from per-processor register snapshots.
//!
//! # Example
//!
//! ```rust
//! use cpuid_core::{Leaves, Processor, ProcessorMap, RegisterSet};
//! use cpuid_topology::{build_topology, LevelType};
//!
//! // Two processors whose leaf 0x0B reports one core level at shift 1.
//! let mut processors = ProcessorMap::new();
//! for id in [0, 1] {
//!     let leaves = Leaves::new()
//!         .with(0xB, 0, RegisterSet::new(1, 1, 0x0200, id))
//!         .with(0xB, 1, RegisterSet::new(0, 0, 0x0001, id));
//!     processors.insert(id, Processor::new(id, leaves));
//! }
//!
//! let system = build_topology(&processors);
//! assert_eq!(system.packages().len(), 1);
//! assert_eq!(system.packages()[&0].physical_cores.len(), 2);
//! assert_eq!(system.mask_width(LevelType::Core), 1);
//! ```

use std::collections::BTreeMap;

use cpuid_core::{Processor, ProcessorMap, Vendor};
use tracing::debug;

use crate::cache::{cache_descriptors, Cache, CacheKey};
use crate::issue::TopologyIssue;
use crate::level::{record, select_layout, Placement};
use crate::system::{CacheRef, LogicalCore, Package, PhysicalCore, SystemTopology};

/// Processor id, record, and derived component ids.
type Placed<'a> = (u32, &'a Processor, Placement);

/// Build the machine topology for every processor in `processors`.
///
/// Never fails: an empty map yields an empty snapshot, missing topology
/// leaves yield the degraded single-package layout, and inconsistent input
/// is recorded in [`SystemTopology::issues`].
pub fn build_topology(processors: &ProcessorMap) -> SystemTopology {
    let mut issues = Vec::new();
    let vendor = processors
        .values()
        .next()
        .map(Processor::vendor)
        .unwrap_or(Vendor::UNKNOWN);
    let layout = select_layout(processors.values(), &mut issues);

    // Ascending processor order; a later processor displaces an earlier one.
    let mut slots: BTreeMap<(u32, u32, u32), Placed<'_>> = BTreeMap::new();
    for (&processor_id, cpu) in processors {
        let placement = layout.place(cpu.apic_id());
        let key = (placement.package_id, placement.core_id, placement.thread_id);
        if let Some((dropped, _, _)) = slots.insert(key, (processor_id, cpu, placement)) {
            record(
                &mut issues,
                TopologyIssue::DuplicateKey {
                    kept: processor_id,
                    dropped,
                    apic_id: cpu.apic_id(),
                    package_id: key.0,
                    core_id: key.1,
                    thread_id: key.2,
                },
            );
        }
    }

    let mut placed: Vec<Placed<'_>> = slots.into_values().collect();
    placed.sort_by_key(|(_, cpu, _)| cpu.apic_id());

    let (all_caches, reported) = collect_caches(&placed, &mut issues);
    let index: BTreeMap<CacheKey, usize> = all_caches
        .iter()
        .enumerate()
        .map(|(i, cache)| (cache.descriptor.key(), i))
        .collect();

    let all_cores: Vec<LogicalCore> = placed
        .into_iter()
        .zip(reported)
        .map(|((processor_id, cpu, placement), keys)| {
            let mut core = LogicalCore::placed(processor_id, cpu.apic_id(), placement);
            attach_caches(&mut core, &keys, &index, &all_caches);
            core
        })
        .collect();

    let packages = build_hierarchy(&all_cores);
    let apic_ids = all_cores.iter().map(|core| core.apic_id).collect();

    debug!(
        source = ?layout.source,
        processors = all_cores.len(),
        packages = packages.len(),
        caches = all_caches.len(),
        issues = issues.len(),
        "built topology"
    );

    SystemTopology {
        vendor,
        source: layout.source,
        levels: layout.descriptions(),
        mask_widths: layout.mask_widths(),
        valid_levels: layout.valid_levels(),
        apic_ids,
        packages,
        all_cores,
        all_caches,
        issues,
    }
}

/// Merge every placed processor's cache descriptors, keyed by
/// (level, type, size). Returns the caches in key order and, per placed
/// processor, the keys it reported.
fn collect_caches(
    placed: &[Placed<'_>],
    issues: &mut Vec<TopologyIssue>,
) -> (Vec<Cache>, Vec<Vec<CacheKey>>) {
    let mut caches: BTreeMap<CacheKey, Cache> = BTreeMap::new();
    let mut reported = Vec::with_capacity(placed.len());

    for (_, cpu, _) in placed {
        let apic_id = cpu.apic_id();
        let mut keys = Vec::new();
        for descriptor in cache_descriptors(cpu) {
            let key = descriptor.key();
            let found = descriptor.sharing_mask_width;
            let cache = caches
                .entry(key)
                .or_insert_with(|| Cache::new(descriptor));
            let expected = cache.descriptor.sharing_mask_width;
            if expected != found {
                record(
                    issues,
                    TopologyIssue::CacheShapeMismatch {
                        apic_id,
                        level: key.level,
                        cache_type: key.cache_type,
                        expected,
                        found,
                    },
                );
            }
            cache.add_member(apic_id);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        reported.push(keys);
    }

    (caches.into_values().collect(), reported)
}

fn attach_caches(
    core: &mut LogicalCore,
    keys: &[CacheKey],
    index: &BTreeMap<CacheKey, usize>,
    all_caches: &[Cache],
) {
    for key in keys {
        let Some(&cache) = index.get(key) else {
            continue;
        };
        let Some((instance, members)) = all_caches
            .get(cache)
            .and_then(|c| c.instance_of(core.apic_id))
        else {
            continue;
        };
        let cache_ref = CacheRef { cache, instance };
        if members.len() > 1 {
            core.shared_caches.push(cache_ref);
        } else {
            core.non_shared_caches.push(cache_ref);
        }
    }
}

fn build_hierarchy(all_cores: &[LogicalCore]) -> BTreeMap<u32, Package> {
    let mut packages: BTreeMap<u32, Package> = BTreeMap::new();
    for (index, core) in all_cores.iter().enumerate() {
        let package = packages
            .entry(core.package_id)
            .or_insert_with(|| Package {
                package_id: core.package_id,
                ..Default::default()
            });
        package
            .physical_cores
            .entry(core.core_id)
            .or_insert_with(|| PhysicalCore {
                core_id: core.core_id,
                ..Default::default()
            })
            .logical_cores
            .insert(core.thread_id, index);
    }
    packages
}
