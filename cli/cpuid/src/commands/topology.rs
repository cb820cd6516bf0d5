//! `cpuid topology`: reconstruct the machine hierarchy.

use std::path::Path;

use anyhow::Result;
use cpuid_topology::{build_topology, SystemTopology};
use tracing::{info, warn};

use super::{load_processors, print_json};

pub fn build(input: &Path) -> Result<SystemTopology> {
    let processors = load_processors(input)?;
    let system = build_topology(&processors);
    if system.is_degraded() && !processors.is_empty() {
        warn!("snapshot has no topology leaves; reporting one flat package");
    }
    info!(
        processors = system.apic_ids().len(),
        packages = system.packages().len(),
        "topology built"
    );
    Ok(system)
}

pub fn run(input: &Path) -> Result<()> {
    print_json(&build(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::write_machine;
    use cpuid_topology::{LevelType, TopologySource};

    #[test]
    fn smt_siblings_share_one_core() {
        let dir = tempfile::tempdir().unwrap();
        let system = build(&write_machine(&dir)).unwrap();

        assert_eq!(system.source(), TopologySource::ExtendedTopology);
        assert_eq!(system.packages().len(), 1);
        let core = &system.packages()[&0].physical_cores[&0];
        assert_eq!(core.logical_cores.len(), 2);
        assert_eq!(system.mask_width(LevelType::Thread), 1);
        assert_eq!(system.all_caches().len(), 1);
        assert_eq!(system.all_cores()[1].non_shared_caches.len(), 1);
    }

    #[test]
    fn serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let system = build(&write_machine(&dir)).unwrap();
        let json = serde_json::to_value(&system).unwrap();
        assert_eq!(json["vendor"], "INTEL");
        assert_eq!(json["apic-ids"], serde_json::json!([0, 1]));
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = build(&dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{err:#}").contains("loading snapshot"));
    }
}
