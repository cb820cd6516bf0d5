//! Selector evaluation against processor records.

use std::collections::BTreeMap;
use std::fmt;

use cpuid_core::registers::{bit, bits};
use cpuid_core::{Processor, ProcessorMap};
use serde::Serialize;

use crate::selector::FlagSelector;

/// Value of a selector on one processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagValue {
    /// The processor did not report the (leaf, subleaf) pair.
    NotPresent,
    /// A single-bit selector.
    Bit(bool),
    /// A multi-bit field, or the whole register.
    Field(u32),
}

impl FlagValue {
    pub fn is_present(&self) -> bool {
        !matches!(self, FlagValue::NotPresent)
    }

    /// Truthiness: a set bit or a non-zero field.
    pub fn is_set(&self) -> bool {
        match *self {
            FlagValue::NotPresent => false,
            FlagValue::Bit(set) => set,
            FlagValue::Field(value) => value != 0,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            FlagValue::NotPresent => None,
            FlagValue::Bit(set) => Some(u32::from(set)),
            FlagValue::Field(value) => Some(value),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::NotPresent => f.write_str("not present"),
            FlagValue::Bit(set) => write!(f, "{set}"),
            FlagValue::Field(value) => write!(f, "{value:#x}"),
        }
    }
}

/// Read `selector` from one processor's registers.
pub fn evaluate(selector: &FlagSelector, cpu: &Processor) -> FlagValue {
    let Some(regs) = cpu.registers(selector.leaf, selector.subleaf) else {
        return FlagValue::NotPresent;
    };
    let value = regs.get(selector.register);
    match selector.bits {
        None => FlagValue::Field(value),
        Some(range) if range.is_single() => FlagValue::Bit(bit(value, range.low)),
        Some(range) => FlagValue::Field(bits(value, range.low, range.high)),
    }
}

/// Read `selector` from every processor, keyed by the input map's keys.
pub fn evaluate_all(selector: &FlagSelector, processors: &ProcessorMap) -> BTreeMap<u32, FlagValue> {
    processors
        .iter()
        .map(|(&id, cpu)| (id, evaluate(selector, cpu)))
        .collect()
}

impl FlagSelector {
    pub fn evaluate(&self, cpu: &Processor) -> FlagValue {
        evaluate(self, cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::BitRange;
    use cpuid_core::{Leaves, Register, RegisterSet};

    fn cpu_with_leaf1(eax: u32, edx: u32) -> Processor {
        Processor::new(0, Leaves::new().with(1, 0, RegisterSet::new(eax, 0, 0, edx)))
    }

    #[test]
    fn single_bit() {
        let sel = FlagSelector::new(1, Register::Edx).with_bits(BitRange::bit(26));
        assert_eq!(evaluate(&sel, &cpu_with_leaf1(0, 1 << 26)), FlagValue::Bit(true));
        assert_eq!(evaluate(&sel, &cpu_with_leaf1(0, !(1 << 26))), FlagValue::Bit(false));
    }

    #[test]
    fn field_and_whole_register() {
        let family = FlagSelector::new(1, Register::Eax).with_bits(BitRange { low: 8, high: 11 });
        let cpu = cpu_with_leaf1(0x0005_0654, 0);
        assert_eq!(family.evaluate(&cpu), FlagValue::Field(6));

        let whole = FlagSelector::new(1, Register::Eax);
        assert_eq!(whole.evaluate(&cpu), FlagValue::Field(0x0005_0654));
        assert_eq!(whole.evaluate(&cpu).to_string(), "0x50654");
    }

    #[test]
    fn absent_subleaf_is_not_present() {
        let sel = FlagSelector::new(1, Register::Edx).with_subleaf(1);
        let value = evaluate(&sel, &cpu_with_leaf1(0, u32::MAX));
        assert_eq!(value, FlagValue::NotPresent);
        assert!(!value.is_present());
        assert!(!value.is_set());
        assert_eq!(value.as_u32(), None);
    }

    #[test]
    fn evaluate_every_processor() {
        let sel = FlagSelector::new(1, Register::Edx).with_bits(BitRange::bit(0));
        let mut processors = ProcessorMap::new();
        processors.insert(0, cpu_with_leaf1(0, 1));
        processors.insert(1, Processor::new(1, Leaves::new()));
        let values = evaluate_all(&sel, &processors);
        assert_eq!(values[&0], FlagValue::Bit(true));
        assert_eq!(values[&1], FlagValue::NotPresent);
    }
}
