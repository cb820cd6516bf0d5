//! `cpuid flag`: evaluate one selector on every processor.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cpuid_core::leaf::leaf_name;
use cpuid_flags::{evaluate, parse, FlagSelector, FlagValue};
use serde::Serialize;

use super::{load_processors, print_json};
use crate::config::CpuidConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlagReport {
    /// Canonical selector text.
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaf_name: Option<&'static str>,
    pub parsed: FlagSelector,
    /// APIC id → value.
    pub values: BTreeMap<u32, FlagValue>,
}

pub fn evaluate_spec(
    config: &CpuidConfig,
    spec: &str,
    input: &Path,
    apic: Option<u32>,
) -> Result<FlagReport> {
    let text = config.resolve_flag(spec);
    let selector = parse(text).with_context(|| format!("parsing flag selector '{text}'"))?;
    let processors = load_processors(input)?;

    let values: BTreeMap<u32, FlagValue> = processors
        .values()
        .filter(|cpu| apic.map_or(true, |id| cpu.apic_id() == id))
        .map(|cpu| (cpu.apic_id(), evaluate(&selector, cpu)))
        .collect();
    if let Some(id) = apic {
        if values.is_empty() {
            bail!("no processor with APIC id {id} in {}", input.display());
        }
    }

    Ok(FlagReport {
        selector: selector.to_string(),
        leaf_name: leaf_name(selector.leaf),
        parsed: selector,
        values,
    })
}

pub fn run(config: &CpuidConfig, spec: &str, input: &Path, apic: Option<u32>) -> Result<()> {
    print_json(&evaluate_spec(config, spec, input, apic)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::write_machine;

    #[test]
    fn evaluates_on_every_processor() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_machine(&dir);
        let report =
            evaluate_spec(&CpuidConfig::default(), "cpuid.01h:edx.fpu[bit 0]", &input, None).unwrap();

        assert_eq!(report.selector, "CPUID.1H:EDX.fpu[bit 0]");
        assert_eq!(report.leaf_name, Some("version_info"));
        assert_eq!(report.values[&0], FlagValue::Bit(true));
        assert_eq!(report.values[&1], FlagValue::Bit(false));
    }

    #[test]
    fn alias_and_apic_filter() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_machine(&dir);
        let config = CpuidConfig::parse("[flags]\nfamily = \"CPUID.01H:EAX[bits 11:8]\"\n").unwrap();

        let report = evaluate_spec(&config, "family", &input, Some(1)).unwrap();
        assert_eq!(report.values.len(), 1);
        assert_eq!(report.values[&1], FlagValue::Field(6));

        let err = evaluate_spec(&config, "family", &input, Some(7)).unwrap_err();
        assert!(err.to_string().contains("no processor with APIC id 7"));
    }

    #[test]
    fn absent_leaf_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_machine(&dir);
        let report =
            evaluate_spec(&CpuidConfig::default(), "CPUID.(EAX=07H,ECX=0):EBX[bit 5]", &input, None)
                .unwrap();
        assert!(report.values.values().all(|v| *v == FlagValue::NotPresent));
    }

    #[test]
    fn bad_selector_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_machine(&dir);
        let err = evaluate_spec(&CpuidConfig::default(), "CPUID.01H:EQX", &input, None).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("parsing flag selector"));
        assert!(text.contains("unknown register 'EQX' at position 10"));
    }
}
