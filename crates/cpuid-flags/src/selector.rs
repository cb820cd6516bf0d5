//! Flag selector type and its canonical text form.

use std::fmt;
use std::str::FromStr;

use cpuid_core::Register;
use serde::{Deserialize, Serialize};

use crate::error::FlagError;

/// Inclusive bit range within one register; `low <= high <= 31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BitRange {
    pub low: u32,
    pub high: u32,
}

impl BitRange {
    pub fn bit(index: u32) -> Self {
        Self {
            low: index,
            high: index,
        }
    }

    pub fn is_single(&self) -> bool {
        self.low == self.high
    }

    pub fn width(&self) -> u32 {
        self.high - self.low + 1
    }
}

/// One register field of one (leaf, subleaf) pair.
///
/// Leaf and subleaf are raw numbers; they need not appear in the leaf
/// catalog. `bits: None` selects the whole register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlagSelector {
    /// Value loaded into EAX.
    pub leaf: u32,
    /// Value loaded into ECX; 0 when the selector names none.
    pub subleaf: u32,
    /// Output register the flag lives in.
    pub register: Register,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<BitRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FlagSelector {
    /// The whole of `register` in subleaf 0 of `leaf`.
    pub fn new(leaf: u32, register: Register) -> Self {
        Self {
            leaf,
            subleaf: 0,
            register,
            bits: None,
            name: None,
        }
    }

    pub fn with_subleaf(mut self, subleaf: u32) -> Self {
        self.subleaf = subleaf;
        self
    }

    pub fn with_bits(mut self, bits: BitRange) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Upper-case hex with an `H` suffix, prefixed with `0` when the first digit
/// is a letter.
struct SdmHex(u32);

impl fmt::Display for SdmHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = format!("{:X}", self.0);
        if digits.starts_with(|c: char| c.is_ascii_alphabetic()) {
            write!(f, "0{digits}H")
        } else {
            write!(f, "{digits}H")
        }
    }
}

impl fmt::Display for FlagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subleaf == 0 {
            write!(f, "CPUID.{}", SdmHex(self.leaf))?;
        } else {
            write!(
                f,
                "CPUID.(EAX={},ECX={})",
                SdmHex(self.leaf),
                SdmHex(self.subleaf)
            )?;
        }
        write!(f, ":{}", self.register)?;
        if let Some(name) = &self.name {
            write!(f, ".{name}")?;
        }
        match self.bits {
            None => Ok(()),
            Some(range) if range.is_single() => write!(f, "[bit {}]", range.low),
            Some(range) => write!(f, "[bits {}:{}]", range.high, range.low),
        }
    }
}

impl FromStr for FlagSelector {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse::parse(s)
    }
}

/// Canonical text of `selector`.
pub fn serialize(selector: &FlagSelector) -> String {
    selector.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_gets_leading_zero_before_letters() {
        assert_eq!(SdmHex(1).to_string(), "1H");
        assert_eq!(SdmHex(0xA).to_string(), "0AH");
        assert_eq!(SdmHex(0x1F).to_string(), "1FH");
        assert_eq!(SdmHex(0x8000_0001).to_string(), "80000001H");
        assert_eq!(SdmHex(0).to_string(), "0H");
    }

    #[test]
    fn serialize_forms() {
        let sse2 = FlagSelector::new(1, Register::Edx)
            .with_bits(BitRange::bit(26))
            .with_name("SSE2");
        assert_eq!(serialize(&sse2), "CPUID.1H:EDX.SSE2[bit 26]");

        let avx2 = FlagSelector::new(7, Register::Ebx)
            .with_subleaf(1)
            .with_bits(BitRange::bit(5));
        assert_eq!(avx2.to_string(), "CPUID.(EAX=7H,ECX=1H):EBX[bit 5]");

        let family = FlagSelector::new(1, Register::Eax).with_bits(BitRange { low: 8, high: 11 });
        assert_eq!(family.to_string(), "CPUID.1H:EAX[bits 11:8]");

        let whole = FlagSelector::new(0xB, Register::Edx);
        assert_eq!(whole.to_string(), "CPUID.0BH:EDX");
    }

    #[test]
    fn range_width() {
        assert_eq!(BitRange { low: 8, high: 11 }.width(), 4);
        assert!(BitRange::bit(3).is_single());
    }
}
