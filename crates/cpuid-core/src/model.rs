//! Version register (leaf 1 eax) decoding.

use serde::{Deserialize, Serialize};

use crate::registers::bits;
use crate::vendor::Vendor;

/// Leaf carrying the version register in eax.
pub const VERSION_LEAF: u32 = 0x0000_0001;

/// Raw leaf 1 eax with explicit field accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionInfo(pub u32);

impl VersionInfo {
    pub fn stepping(self) -> u32 {
        bits(self.0, 0, 3)
    }

    pub fn model(self) -> u32 {
        bits(self.0, 4, 7)
    }

    pub fn family(self) -> u32 {
        bits(self.0, 8, 11)
    }

    /// Processor type (0 = original OEM, 1 = overdrive, 2 = secondary).
    pub fn processor_type(self) -> u32 {
        bits(self.0, 12, 13)
    }

    pub fn extended_model(self) -> u32 {
        bits(self.0, 16, 19)
    }

    pub fn extended_family(self) -> u32 {
        bits(self.0, 20, 27)
    }
}

/// Effective stepping, model, and family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Model {
    /// Stepping, eax[3:0].
    pub stepping: u32,
    /// Effective model, with the extended model folded in where it applies.
    pub model: u32,
    /// Effective family, with the extended family added for family 0xF.
    pub family: u32,
}

/// Decode the version register into effective family and model.
///
/// Family 0xF always adds the extended family. Whether the extended model
/// is folded in depends on the silicon vendor: AMD and Hygon only do so for
/// family 0xF, everyone else for family 0x6 and 0xF.
pub fn decompose_model(version: u32, vendor: Vendor) -> Model {
    let info = VersionInfo(version);
    let base_family = info.family();

    let family = if base_family == 0xF {
        base_family + info.extended_family()
    } else {
        base_family
    };

    let uses_extended_model = if vendor.is_amd_like() {
        base_family == 0xF
    } else {
        base_family == 0x6 || base_family == 0xF
    };

    let model = if uses_extended_model {
        (info.extended_model() << 4) | info.model()
    } else {
        info.model()
    };

    Model {
        stepping: info.stepping(),
        model,
        family,
    }
}
