//! Cache descriptors and sharing groups.
//!
//! Leaf 4 (Intel) and leaf 0x8000_001D (AMD) share one register layout: one
//! subleaf per cache, terminated by a subleaf whose cache type is 0.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cpuid_core::leaf::{is_terminal, CACHE_PROPERTIES, DETERMINISTIC_CACHE};
use cpuid_core::registers::{bit, bits, RegisterSet};
use cpuid_core::Processor;
use serde::{Deserialize, Serialize};

use crate::level::ceil_log2;

/// Cache type field (eax[4:0]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheType {
    Data,
    Instruction,
    Unified,
    Reserved(u32),
}

impl CacheType {
    /// Decode a non-zero cache type.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => CacheType::Data,
            2 => CacheType::Instruction,
            3 => CacheType::Unified,
            other => CacheType::Reserved(other),
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheType::Data => f.write_str("data"),
            CacheType::Instruction => f.write_str("instruction"),
            CacheType::Unified => f.write_str("unified"),
            CacheType::Reserved(raw) => write!(f, "reserved({raw})"),
        }
    }
}

/// Identity of a cache across processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheKey {
    pub level: u32,
    pub cache_type: CacheType,
    pub total_size: u64,
}

/// One decoded cache subleaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheDescriptor {
    /// Cache level, starting at 1.
    pub level: u32,
    pub cache_type: CacheType,
    /// Ways of associativity.
    pub ways: u32,
    /// Number of sets.
    pub sets: u32,
    /// Coherency line size in bytes.
    pub line_size: u32,
    /// Physical line partitions.
    pub line_partitions: u32,
    /// ways × partitions × line size × sets, in bytes.
    pub total_size: u64,
    /// eax[9].
    pub fully_associative: bool,
    /// Set when the cache reports a single way.
    pub direct_mapped: bool,
    /// edx[2]: sets are selected by a hash of the address.
    pub complex_addressed: bool,
    /// eax[8]: needs no software initialization.
    pub self_initializing: bool,
    /// edx[0] clear: WBINVD also acts on lower-level caches.
    pub invalidates_lower_levels: bool,
    /// edx[1]: inclusive of lower levels.
    pub inclusive: bool,
    /// Low APIC id bits that vary among processors sharing one instance.
    pub sharing_mask_width: u32,
}

impl CacheDescriptor {
    /// Decode one subleaf; `None` for the terminal (type 0) subleaf.
    pub fn decode(regs: &RegisterSet) -> Option<Self> {
        let raw_type = bits(regs.eax, 0, 4);
        if raw_type == 0 {
            return None;
        }

        let ways = bits(regs.ebx, 22, 31) + 1;
        let line_partitions = bits(regs.ebx, 12, 21) + 1;
        let line_size = bits(regs.ebx, 0, 11) + 1;
        let sets = regs.ecx.saturating_add(1);
        let fully_associative = bit(regs.eax, 9);
        let sharing_ids = bits(regs.eax, 14, 25) + 1;

        Some(Self {
            level: bits(regs.eax, 5, 7),
            cache_type: CacheType::from_raw(raw_type),
            ways,
            sets,
            line_size,
            line_partitions,
            total_size: u64::from(ways)
                * u64::from(line_partitions)
                * u64::from(line_size)
                * u64::from(sets),
            fully_associative,
            direct_mapped: !fully_associative && ways == 1,
            complex_addressed: bit(regs.edx, 2),
            self_initializing: bit(regs.eax, 8),
            invalidates_lower_levels: !bit(regs.edx, 0),
            inclusive: bit(regs.edx, 1),
            sharing_mask_width: ceil_log2(sharing_ids),
        })
    }

    pub fn key(&self) -> CacheKey {
        CacheKey {
            level: self.level,
            cache_type: self.cache_type,
            total_size: self.total_size,
        }
    }

    /// Canonical instance id: `apic_id` with the sharing bits cleared.
    pub fn instance_id(&self, apic_id: u32) -> u32 {
        match self.sharing_mask_width {
            0 => apic_id,
            w if w >= 32 => 0,
            w => apic_id & !((1u32 << w) - 1),
        }
    }
}

/// Every cache descriptor reported by one processor, in subleaf order.
///
/// Uses leaf 4 when it reports at least one cache, else 0x8000_001D.
pub fn cache_descriptors(cpu: &Processor) -> Vec<CacheDescriptor> {
    let leaf = [DETERMINISTIC_CACHE, CACHE_PROPERTIES]
        .into_iter()
        .find(|&leaf| {
            cpu.registers(leaf, 0)
                .is_some_and(|regs| !is_terminal(leaf, 0, regs))
        });
    let Some(subleaves) = leaf.and_then(|leaf| cpu.leaves().subleaves(leaf)) else {
        return Vec::new();
    };

    subleaves
        .values()
        .map_while(CacheDescriptor::decode)
        .collect()
}

/// A cache and its physical instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cache {
    #[serde(flatten)]
    pub descriptor: CacheDescriptor,
    /// Canonical instance id → APIC ids sharing that instance.
    pub instances: BTreeMap<u32, BTreeSet<u32>>,
}

impl Cache {
    pub fn new(descriptor: CacheDescriptor) -> Self {
        Self {
            descriptor,
            instances: BTreeMap::new(),
        }
    }

    /// Add a processor to the instance its id selects.
    pub fn add_member(&mut self, apic_id: u32) {
        let instance = self.descriptor.instance_id(apic_id);
        self.instances.entry(instance).or_default().insert(apic_id);
    }

    /// The instance holding `apic_id`, with its members.
    pub fn instance_of(&self, apic_id: u32) -> Option<(u32, &BTreeSet<u32>)> {
        let instance = self.descriptor.instance_id(apic_id);
        self.instances
            .get(&instance)
            .filter(|members| members.contains(&apic_id))
            .map(|members| (instance, members))
    }
}
