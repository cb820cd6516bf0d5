//! Vendor identification.
//!
//! Silicon vendors announce themselves through a 12-byte signature in leaf 0
//! (ebx, edx, ecx). Hypervisors use leaf 0x4000_0000 (ebx, ecx, edx). The two
//! checks are independent; a guest on known silicon reports both flags.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::leaf::{BASIC_INFO, HYPERVISOR_LIMIT, VERSION_INFO, XEN_LIMIT_OFFSET};
use crate::registers::{bit, Leaves, RegisterSet};

bitflags! {
    /// Silicon and hypervisor vendor flags.
    ///
    /// At most one silicon bit is set. The hypervisor group holds one flag,
    /// except for [`Vendor::XEN_VIRIDIAN`]. The empty value means unknown.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Vendor: u32 {
        const AMD       = 0x0000_0001;
        const CENTAUR   = 0x0000_0002;
        const CYRIX     = 0x0000_0004;
        const INTEL     = 0x0000_0008;
        const TRANSMETA = 0x0000_0010;
        const NAT_SEMI  = 0x0000_0020;
        const NEXGEN    = 0x0000_0040;
        const RISE      = 0x0000_0080;
        const SIS       = 0x0000_0100;
        const UMC       = 0x0000_0200;
        const VIA       = 0x0000_0400;
        const VORTEX    = 0x0000_0800;
        const HYGON     = 0x0000_1000;
        const ZHAOXIN   = 0x0000_2000;

        const BHYVE     = 0x0001_0000;
        const KVM       = 0x0002_0000;
        const HYPER_V   = 0x0004_0000;
        const PARALLELS = 0x0008_0000;
        const VMWARE    = 0x0010_0000;
        const XEN_HVM   = 0x0020_0000;
        const QEMU      = 0x0040_0000;
    }
}

impl Vendor {
    /// No recognized vendor.
    pub const UNKNOWN: Vendor = Vendor::empty();
    /// Xen HVM also exposing the Hyper-V (Viridian) interface.
    pub const XEN_VIRIDIAN: Vendor = Vendor::XEN_HVM.union(Vendor::HYPER_V);
    /// Mask selecting the silicon group.
    pub const ANY_SILICON: Vendor = Vendor::from_bits_retain(0x0000_FFFF);
    /// Mask selecting the hypervisor group.
    pub const ANY_HYPERVISOR: Vendor = Vendor::from_bits_retain(0xFFFF_0000);

    /// The silicon half of this value.
    pub fn silicon(self) -> Vendor {
        self & Self::ANY_SILICON
    }

    /// The hypervisor half of this value.
    pub fn hypervisor(self) -> Vendor {
        self & Self::ANY_HYPERVISOR
    }

    pub fn is_unknown(self) -> bool {
        self.is_empty()
    }

    /// True for vendors that follow AMD's family/model and topology conventions.
    pub fn is_amd_like(self) -> bool {
        self.intersects(Vendor::AMD | Vendor::HYGON)
    }

    /// Display name of the silicon vendor.
    pub fn silicon_name(self) -> &'static str {
        SILICON_SIGNATURES
            .iter()
            .find(|(flag, _, _)| *flag == self.silicon())
            .map(|(_, name, _)| *name)
            .unwrap_or("Unknown")
    }

    /// Display name of the hypervisor, if any.
    pub fn hypervisor_name(self) -> Option<&'static str> {
        HYPERVISOR_SIGNATURES
            .iter()
            .find(|(flag, _, _)| *flag == self.hypervisor())
            .map(|(_, name, _)| *name)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hypervisor_name() {
            Some(hv) => write!(f, "{hv} on {}", self.silicon_name()),
            None => f.write_str(self.silicon_name()),
        }
    }
}

/// (flag, display name, signatures)
type SignatureEntry = (Vendor, &'static str, &'static [&'static [u8; 12]]);

static SILICON_SIGNATURES: &[SignatureEntry] = &[
    (Vendor::AMD, "AMD", &[b"AuthenticAMD", b"AMDisbetter!"]),
    (Vendor::CENTAUR, "Centaur", &[b"CentaurHauls"]),
    (Vendor::CYRIX, "Cyrix", &[b"CyrixInstead"]),
    (Vendor::INTEL, "Intel", &[b"GenuineIntel"]),
    (Vendor::TRANSMETA, "Transmeta", &[b"TransmetaCPU", b"GenuineTMx86"]),
    (Vendor::NAT_SEMI, "National Semiconductor", &[b"Geode by NSC"]),
    (Vendor::NEXGEN, "NexGen", &[b"NexGenDriven"]),
    (Vendor::RISE, "Rise", &[b"RiseRiseRise"]),
    (Vendor::SIS, "SiS", &[b"SiS SiS SiS "]),
    (Vendor::UMC, "UMC", &[b"UMC UMC UMC "]),
    (Vendor::VIA, "VIA", &[b"VIA VIA VIA "]),
    (Vendor::VORTEX, "Vortex", &[b"Vortex86 SoC"]),
    (Vendor::HYGON, "Hygon", &[b"HygonGenuine"]),
    (Vendor::ZHAOXIN, "Zhaoxin", &[b"  Shanghai  "]),
];

static HYPERVISOR_SIGNATURES: &[SignatureEntry] = &[
    (Vendor::BHYVE, "bhyve", &[b"bhyve bhyve "]),
    (Vendor::KVM, "KVM", &[b"KVMKVMKVM\0\0\0"]),
    (Vendor::HYPER_V, "Hyper-V", &[b"Microsoft Hv"]),
    (Vendor::PARALLELS, "Parallels", &[b" lrpepyh  vr", b"prl hyperv  "]),
    (Vendor::VMWARE, "VMware", &[b"VMwareVMware"]),
    (Vendor::XEN_HVM, "Xen HVM", &[b"XenVMMXenVMM"]),
    (Vendor::QEMU, "QEMU", &[b"TCGTCGTCGTCG"]),
    // Detected from two leaves, never from a single signature.
    (Vendor::XEN_VIRIDIAN, "Xen HVM with Viridian Extensions", &[]),
];

/// Pack three registers into a 12-byte ASCII signature, little-endian per register.
pub fn signature_bytes(first: u32, second: u32, third: u32) -> [u8; 12] {
    let mut sig = [0u8; 12];
    sig[0..4].copy_from_slice(&first.to_le_bytes());
    sig[4..8].copy_from_slice(&second.to_le_bytes());
    sig[8..12].copy_from_slice(&third.to_le_bytes());
    sig
}

fn lookup(catalog: &[SignatureEntry], signature: &[u8; 12]) -> Vendor {
    catalog
        .iter()
        .find(|(_, _, sigs)| sigs.iter().any(|s| *s == signature))
        .map(|(flag, _, _)| *flag)
        .unwrap_or(Vendor::UNKNOWN)
}

/// Match a signature against every known silicon and hypervisor signature.
///
/// Returns the single matching flag, or [`Vendor::UNKNOWN`].
pub fn identify_vendor(signature: &[u8; 12]) -> Vendor {
    let silicon = lookup(SILICON_SIGNATURES, signature);
    if !silicon.is_unknown() {
        return silicon;
    }
    lookup(HYPERVISOR_SIGNATURES, signature)
}

/// Silicon flag from leaf 0 registers (ebx, edx, ecx order).
pub fn identify_silicon(regs: &RegisterSet) -> Vendor {
    lookup(SILICON_SIGNATURES, &signature_bytes(regs.ebx, regs.edx, regs.ecx))
}

/// Hypervisor flag from leaf 0x4000_0000 registers (ebx, ecx, edx order).
pub fn identify_hypervisor(regs: &RegisterSet) -> Vendor {
    lookup(HYPERVISOR_SIGNATURES, &signature_bytes(regs.ebx, regs.ecx, regs.edx))
}

/// Combined vendor value for a processor's snapshot.
///
/// The hypervisor half is only consulted when leaf 1 is absent or its
/// hypervisor-present bit (ecx[31]) is set. Xen offering the Hyper-V
/// interface answers "Microsoft Hv" at 0x4000_0000 and moves its own
/// signature to 0x4000_0100; that pair yields [`Vendor::XEN_VIRIDIAN`].
pub fn vendor_from_leaves(leaves: &Leaves) -> Vendor {
    let silicon = leaves
        .get(BASIC_INFO, 0)
        .map(identify_silicon)
        .unwrap_or(Vendor::UNKNOWN);

    let hypervisor_present = leaves
        .get(VERSION_INFO, 0)
        .map(|regs| bit(regs.ecx, 31))
        .unwrap_or(true);
    if !hypervisor_present {
        return silicon;
    }

    let signature_at = |leaf| {
        leaves
            .get(leaf, 0)
            .map(identify_hypervisor)
            .unwrap_or(Vendor::UNKNOWN)
    };
    let primary = signature_at(HYPERVISOR_LIMIT);
    let offset = signature_at(XEN_LIMIT_OFFSET);

    let hypervisor = if primary == Vendor::HYPER_V && offset == Vendor::XEN_HVM {
        Vendor::XEN_VIRIDIAN
    } else if primary.is_unknown() {
        offset
    } else {
        primary
    };

    silicon | hypervisor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(sig: &[u8; 12]) -> (u32, u32, u32) {
        let w = |i: usize| u32::from_le_bytes([sig[i], sig[i + 1], sig[i + 2], sig[i + 3]]);
        (w(0), w(4), w(8))
    }

    fn leaf0(sig: &[u8; 12]) -> RegisterSet {
        let (b, d, c) = words(sig);
        RegisterSet::new(0x16, b, c, d)
    }

    fn hv_leaf(sig: &[u8; 12]) -> RegisterSet {
        let (b, c, d) = words(sig);
        RegisterSet::new(0x4000_0010, b, c, d)
    }

    #[test]
    fn every_known_signature_matches_its_flag() {
        for (flag, _, sigs) in SILICON_SIGNATURES.iter().chain(HYPERVISOR_SIGNATURES) {
            for sig in sigs.iter() {
                assert_eq!(identify_vendor(sig), *flag, "signature {:?}", sig);
            }
        }
    }

    #[test]
    fn unknown_signature_is_unknown() {
        assert_eq!(identify_vendor(b"GenuineIotel"), Vendor::UNKNOWN);
        assert_eq!(identify_vendor(&[0u8; 12]), Vendor::UNKNOWN);
    }

    #[test]
    fn signature_packing_is_little_endian() {
        // "Genu" "ineI" "ntel"
        let sig = signature_bytes(0x756e_6547, 0x4965_6e69, 0x6c65_746e);
        assert_eq!(&sig, b"GenuineIntel");
    }

    #[test]
    fn silicon_register_order() {
        assert_eq!(identify_silicon(&leaf0(b"AuthenticAMD")), Vendor::AMD);
        assert_eq!(identify_hypervisor(&hv_leaf(b"KVMKVMKVM\0\0\0")), Vendor::KVM);
    }

    #[test]
    fn guest_reports_both_halves() {
        let leaves = Leaves::new()
            .with(0, 0, leaf0(b"GenuineIntel"))
            .with(1, 0, RegisterSet::new(0x0005_0654, 0, 1 << 31, 0))
            .with(HYPERVISOR_LIMIT, 0, hv_leaf(b"VMwareVMware"));
        let vendor = vendor_from_leaves(&leaves);
        assert_eq!(vendor, Vendor::INTEL | Vendor::VMWARE);
        assert_eq!(vendor.silicon(), Vendor::INTEL);
        assert_eq!(vendor.hypervisor(), Vendor::VMWARE);
        assert_eq!(vendor.to_string(), "VMware on Intel");
    }

    #[test]
    fn hypervisor_ignored_without_present_bit() {
        let leaves = Leaves::new()
            .with(0, 0, leaf0(b"AuthenticAMD"))
            .with(1, 0, RegisterSet::default())
            .with(HYPERVISOR_LIMIT, 0, hv_leaf(b"KVMKVMKVM\0\0\0"));
        assert_eq!(vendor_from_leaves(&leaves), Vendor::AMD);
    }

    #[test]
    fn xen_with_viridian_reports_both() {
        let leaves = Leaves::new()
            .with(0, 0, leaf0(b"GenuineIntel"))
            .with(1, 0, RegisterSet::new(0x0005_0654, 0, 1 << 31, 0))
            .with(HYPERVISOR_LIMIT, 0, hv_leaf(b"Microsoft Hv"))
            .with(XEN_LIMIT_OFFSET, 0, hv_leaf(b"XenVMMXenVMM"));
        let vendor = vendor_from_leaves(&leaves);
        assert_eq!(vendor, Vendor::INTEL | Vendor::XEN_VIRIDIAN);
        assert!(vendor.contains(Vendor::XEN_HVM));
        assert_eq!(vendor.hypervisor(), Vendor::XEN_VIRIDIAN);
        assert_eq!(vendor.to_string(), "Xen HVM with Viridian Extensions on Intel");
    }

    #[test]
    fn plain_hyper_v_ignores_unrelated_offset_leaf() {
        let leaves = Leaves::new()
            .with(0, 0, leaf0(b"GenuineIntel"))
            .with(HYPERVISOR_LIMIT, 0, hv_leaf(b"Microsoft Hv"))
            .with(XEN_LIMIT_OFFSET, 0, RegisterSet::default());
        assert_eq!(vendor_from_leaves(&leaves), Vendor::INTEL | Vendor::HYPER_V);
        assert_eq!(
            vendor_from_leaves(&leaves).to_string(),
            "Hyper-V on Intel"
        );
    }

    #[test]
    fn xen_offset_signature_is_fallback() {
        let leaves = Leaves::new()
            .with(0, 0, leaf0(b"GenuineIntel"))
            .with(HYPERVISOR_LIMIT, 0, RegisterSet::default())
            .with(XEN_LIMIT_OFFSET, 0, hv_leaf(b"XenVMMXenVMM"));
        assert_eq!(vendor_from_leaves(&leaves), Vendor::INTEL | Vendor::XEN_HVM);
    }

    #[test]
    fn unknown_halves_are_zero_not_errors() {
        let leaves = Leaves::new().with(0, 0, leaf0(b"NotARealCPU!"));
        assert!(vendor_from_leaves(&leaves).is_unknown());
        assert_eq!(Vendor::UNKNOWN.to_string(), "Unknown");
    }
}
