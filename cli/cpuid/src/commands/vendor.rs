//! `cpuid vendor`: vendor and model of every processor.

use std::path::Path;

use anyhow::Result;
use cpuid_core::{Model, ProcessorMap, Vendor};
use serde::Serialize;

use super::{load_processors, print_json};

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VendorEntry {
    pub apic_id: u32,
    /// Display form, e.g. `KVM on AMD`.
    pub vendor: String,
    pub flags: Vendor,
    pub silicon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<&'static str>,
    pub model: Model,
}

pub fn describe(processors: &ProcessorMap) -> Vec<VendorEntry> {
    processors
        .values()
        .map(|cpu| {
            let vendor = cpu.vendor();
            VendorEntry {
                apic_id: cpu.apic_id(),
                vendor: vendor.to_string(),
                flags: vendor,
                silicon: vendor.silicon_name(),
                hypervisor: vendor.hypervisor_name(),
                model: cpu.model(),
            }
        })
        .collect()
}

pub fn run(input: &Path) -> Result<()> {
    let processors = load_processors(input)?;
    print_json(&describe(&processors))
}
