//! Per-logical-processor record.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::leaf::{EXTENDED_TOPOLOGY, EXTENDED_TOPOLOGY_V2, VERSION_INFO};
use crate::model::{decompose_model, Model};
use crate::registers::{bits, Leaves, RegisterSet};
use crate::vendor::{vendor_from_leaves, Vendor};

/// All processors of one machine, keyed by processor id (normally the APIC id).
pub type ProcessorMap = BTreeMap<u32, Processor>;

/// One logical processor: its id, decoded identity, and raw registers.
///
/// Fields are private; a record is built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Processor {
    apic_id: u32,
    vendor: Vendor,
    model: Model,
    leaves: Leaves,
}

impl Processor {
    /// Build a record with an explicit APIC id; vendor and model are decoded
    /// from the registers.
    pub fn new(apic_id: u32, leaves: Leaves) -> Self {
        let vendor = vendor_from_leaves(&leaves);
        let model = leaves
            .get(VERSION_INFO, 0)
            .map(|regs| decompose_model(regs.eax, vendor))
            .unwrap_or_default();
        Self {
            apic_id,
            vendor,
            model,
            leaves,
        }
    }

    /// Build a record whose APIC id is taken from the registers themselves.
    pub fn from_leaves(leaves: Leaves) -> Self {
        let apic_id = derive_apic_id(&leaves);
        Self::new(apic_id, leaves)
    }

    /// Initial APIC id, the basis for topology placement.
    pub fn apic_id(&self) -> u32 {
        self.apic_id
    }

    /// Silicon and hypervisor vendor flags.
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Effective family, model, and stepping.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Every captured (leaf, subleaf) pair.
    pub fn leaves(&self) -> &Leaves {
        &self.leaves
    }

    /// Registers for a (leaf, subleaf) pair, if captured.
    pub fn registers(&self, leaf: u32, subleaf: u32) -> Option<&RegisterSet> {
        self.leaves.get(leaf, subleaf)
    }

    /// True when any subleaf of `leaf` was captured.
    pub fn has_leaf(&self, leaf: u32) -> bool {
        self.leaves.contains_leaf(leaf)
    }
}

/// Best available APIC id: the 32-bit x2APIC id from a topology leaf, else
/// the 8-bit initial APIC id from leaf 1 ebx[31:24], else 0.
pub fn derive_apic_id(leaves: &Leaves) -> u32 {
    [EXTENDED_TOPOLOGY_V2, EXTENDED_TOPOLOGY]
        .into_iter()
        .filter_map(|leaf| leaves.get(leaf, 0))
        .find(|regs| bits(regs.ecx, 8, 15) != 0)
        .map(|regs| regs.edx)
        .or_else(|| leaves.get(VERSION_INFO, 0).map(|regs| bits(regs.ebx, 24, 31)))
        .unwrap_or(0)
}
