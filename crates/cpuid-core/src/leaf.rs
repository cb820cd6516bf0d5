//! Static catalog of known leaves.
//!
//! Pure data: numeric leaf ids, their names, and which subleaves carry
//! architecturally defined content. Leaves missing from the catalog are still
//! valid everywhere else in the workspace; the catalog only names things.

use serde::Serialize;

use crate::registers::{bits, RegisterSet, Subleaves};
use crate::vendor::Vendor;

pub const BASIC_INFO: u32 = 0x0000_0000;
pub const VERSION_INFO: u32 = 0x0000_0001;
pub const DETERMINISTIC_CACHE: u32 = 0x0000_0004;
pub const EXTENDED_FEATURES: u32 = 0x0000_0007;
pub const EXTENDED_TOPOLOGY: u32 = 0x0000_000B;
pub const EXTENDED_TOPOLOGY_V2: u32 = 0x0000_001F;
pub const HYPERVISOR_LIMIT: u32 = 0x4000_0000;
pub const XEN_LIMIT_OFFSET: u32 = 0x4000_0100;
pub const ADDRESS_LIMITS: u32 = 0x8000_0008;
pub const CACHE_PROPERTIES: u32 = 0x8000_001D;
pub const EXTENDED_APIC: u32 = 0x8000_001E;

/// Which subleaves of a leaf are architecturally meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubleafKind {
    /// Only subleaf 0.
    Single,
    /// A fixed list of indices.
    Listed(&'static [u32]),
    /// Subleaf 0 eax holds the highest valid index.
    Counted,
    /// Walk upward until the leaf's terminal marker (see [`is_terminal`]).
    Enumerated,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LeafInfo {
    pub leaf: u32,
    /// Mnemonic, usable in flag selectors.
    pub name: &'static str,
    /// Vendors for which this meaning applies; empty means any.
    pub vendors: Vendor,
    pub subleaves: SubleafKind,
}

impl LeafInfo {
    const fn any(leaf: u32, name: &'static str, subleaves: SubleafKind) -> Self {
        Self {
            leaf,
            name,
            vendors: Vendor::UNKNOWN,
            subleaves,
        }
    }

    const fn only(leaf: u32, name: &'static str, vendors: Vendor, subleaves: SubleafKind) -> Self {
        Self {
            leaf,
            name,
            vendors,
            subleaves,
        }
    }

    fn applies_to(&self, vendor: Vendor) -> bool {
        self.vendors.is_empty() || self.vendors.intersects(vendor)
    }

    /// Whether `subleaf` is architecturally defined, given the captured subleaves.
    pub fn defines_subleaf(&self, subleaf: u32, captured: &Subleaves) -> bool {
        match self.subleaves {
            SubleafKind::Single => subleaf == 0,
            SubleafKind::Listed(list) => list.contains(&subleaf),
            SubleafKind::Counted => captured
                .get(&0)
                .map(|regs| subleaf <= regs.eax)
                .unwrap_or(subleaf == 0),
            SubleafKind::Enumerated => captured
                .range(..=subleaf)
                .all(|(idx, regs)| !is_terminal(self.leaf, *idx, regs)),
        }
    }
}

use SubleafKind::{Counted, Enumerated, Listed, Single};

const HV: Vendor = Vendor::HYPER_V;
const XEN: Vendor = Vendor::XEN_HVM;
const KVM: Vendor = Vendor::KVM;

/// The catalog, append-only, ascending by leaf within each vendor group.
pub static LEAVES: &[LeafInfo] = &[
    LeafInfo::any(0x0000_0000, "basic_info", Single),
    LeafInfo::any(0x0000_0001, "version_info", Single),
    LeafInfo::any(0x0000_0002, "cache_and_tlb", Single),
    LeafInfo::any(0x0000_0003, "serial_number", Single),
    LeafInfo::any(0x0000_0004, "deterministic_cache", Enumerated),
    LeafInfo::any(0x0000_0005, "monitor_mwait", Single),
    LeafInfo::any(0x0000_0006, "thermal_and_power", Single),
    LeafInfo::any(0x0000_0007, "extended_features", Counted),
    LeafInfo::any(0x0000_0009, "direct_cache_access", Single),
    LeafInfo::any(0x0000_000A, "performance_monitoring", Single),
    LeafInfo::any(0x0000_000B, "extended_topology", Enumerated),
    LeafInfo::any(0x0000_000D, "extended_state", Listed(&[
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19,
    ])),
    LeafInfo::any(0x0000_000F, "rdt_monitoring", Listed(&[0, 1])),
    LeafInfo::any(0x0000_0010, "rdt_allocation", Listed(&[0, 1, 2, 3])),
    LeafInfo::any(0x0000_0012, "sgx_info", Listed(&[0, 1])),
    LeafInfo::any(0x0000_0014, "processor_trace", Counted),
    LeafInfo::any(0x0000_0015, "time_stamp_counter", Single),
    LeafInfo::any(0x0000_0016, "processor_frequency", Single),
    LeafInfo::any(0x0000_0017, "system_on_chip_vendor", Counted),
    LeafInfo::any(0x0000_0018, "deterministic_tlb", Counted),
    LeafInfo::any(0x0000_001B, "pconfig", Single),
    LeafInfo::any(0x0000_001F, "extended_topology_v2", Enumerated),
    LeafInfo::any(0x4000_0000, "hypervisor_limit", Single),
    LeafInfo::only(0x4000_0001, "hyper_v_signature", HV, Single),
    LeafInfo::only(0x4000_0002, "hyper_v_system_identity", HV, Single),
    LeafInfo::only(0x4000_0003, "hyper_v_features", HV, Single),
    LeafInfo::only(0x4000_0004, "hyper_v_enlightenment_recs", HV, Single),
    LeafInfo::only(0x4000_0005, "hyper_v_implementation_limits", HV, Single),
    LeafInfo::only(0x4000_0006, "hyper_v_implementation_hardware", HV, Single),
    LeafInfo::only(0x4000_0007, "hyper_v_root_cpu_management", HV, Single),
    LeafInfo::only(0x4000_0008, "hyper_v_shared_virtual_memory", HV, Single),
    LeafInfo::only(0x4000_0009, "hyper_v_nested_hypervisor", HV, Single),
    LeafInfo::only(0x4000_000A, "hyper_v_nested_features", HV, Single),
    LeafInfo::only(0x4000_0001, "xen_version", XEN, Single),
    LeafInfo::only(0x4000_0002, "xen_features", XEN, Single),
    LeafInfo::only(0x4000_0003, "xen_time", XEN, Listed(&[0, 1, 2])),
    LeafInfo::only(0x4000_0004, "xen_hvm_features", XEN, Single),
    LeafInfo::only(0x4000_0005, "xen_pv_features", XEN, Single),
    LeafInfo::only(0x4000_0100, "xen_limit_offset", XEN, Single),
    LeafInfo::only(0x4000_0101, "xen_version_offset", XEN, Single),
    LeafInfo::only(0x4000_0102, "xen_features_offset", XEN, Single),
    LeafInfo::only(0x4000_0103, "xen_time_offset", XEN, Listed(&[0, 1, 2])),
    LeafInfo::only(0x4000_0104, "xen_hvm_features_offset", XEN, Single),
    LeafInfo::only(0x4000_0105, "xen_pv_features_offset", XEN, Single),
    LeafInfo::only(0x4000_0001, "kvm_features", KVM, Single),
    LeafInfo::only(0x4000_0010, "vmware_timing", Vendor::VMWARE, Single),
    LeafInfo::any(0x8000_0000, "extended_limit", Single),
    LeafInfo::any(0x8000_0001, "extended_signature_and_features", Single),
    LeafInfo::any(0x8000_0002, "brand_string_0", Single),
    LeafInfo::any(0x8000_0003, "brand_string_1", Single),
    LeafInfo::any(0x8000_0004, "brand_string_2", Single),
    LeafInfo::any(0x8000_0005, "l1_cache_identifiers", Single),
    LeafInfo::any(0x8000_0006, "l2_cache_identifiers", Single),
    LeafInfo::any(0x8000_0007, "ras_advanced_power_management", Single),
    LeafInfo::any(0x8000_0008, "address_limits", Single),
    LeafInfo::any(0x8000_000A, "secure_virtual_machine", Single),
    LeafInfo::any(0x8000_0019, "tlb_1g_identifiers", Single),
    LeafInfo::any(0x8000_001A, "performance_optimization", Single),
    LeafInfo::any(0x8000_001B, "instruction_based_sampling", Single),
    LeafInfo::any(0x8000_001C, "lightweight_profiling", Single),
    LeafInfo::any(0x8000_001D, "cache_properties", Enumerated),
    LeafInfo::any(0x8000_001E, "extended_apic", Single),
    LeafInfo::any(0x8000_001F, "encrypted_memory", Single),
];

/// First catalog entry for `leaf`, regardless of vendor.
pub fn lookup(leaf: u32) -> Option<&'static LeafInfo> {
    LEAVES.iter().find(|info| info.leaf == leaf)
}

/// Catalog entry for `leaf` as understood on a machine reporting `vendor`.
pub fn lookup_for(leaf: u32, vendor: Vendor) -> Option<&'static LeafInfo> {
    LEAVES
        .iter()
        .find(|info| info.leaf == leaf && info.applies_to(vendor))
}

/// Leaf id for a mnemonic, ignoring case.
pub fn find_by_name(name: &str) -> Option<&'static LeafInfo> {
    LEAVES.iter().find(|info| info.name.eq_ignore_ascii_case(name))
}

/// Name of `leaf` for display; `None` for undocumented leaves.
pub fn leaf_name(leaf: u32) -> Option<&'static str> {
    lookup(leaf).map(|info| info.name)
}

/// Architectural end-of-enumeration marker for enumerated leaves.
///
/// Topology leaves end at level type 0 (ecx[15:8]); cache leaves end at
/// cache type 0 (eax[4:0]). Other leaves have no marker.
pub fn is_terminal(leaf: u32, _subleaf: u32, regs: &RegisterSet) -> bool {
    match leaf {
        EXTENDED_TOPOLOGY | EXTENDED_TOPOLOGY_V2 => bits(regs.ecx, 8, 15) == 0,
        DETERMINISTIC_CACHE | CACHE_PROPERTIES => bits(regs.eax, 0, 4) == 0,
        _ => false,
    }
}
