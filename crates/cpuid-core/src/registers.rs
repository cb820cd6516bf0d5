//! Register snapshots.
//!
//! One CPUID query returns four 32-bit registers. A processor's snapshot is
//! every (leaf, subleaf) pair it answered, kept in ascending numeric order so
//! traversal and output are deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four registers written by CPUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Eax,
    Ebx,
    Ecx,
    Edx,
}

impl Register {
    /// All registers in output order.
    pub const ALL: [Register; 4] = [Register::Eax, Register::Ebx, Register::Ecx, Register::Edx];

    /// Upper-case assembler name (`"EAX"`).
    pub fn name(&self) -> &'static str {
        match self {
            Register::Eax => "EAX",
            Register::Ebx => "EBX",
            Register::Ecx => "ECX",
            Register::Edx => "EDX",
        }
    }

    /// Look up a register by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extract the inclusive bit field `[high:low]` from `value`.
///
/// `high` is clamped to 31; an empty range (`low > high`) yields 0.
pub fn bits(value: u32, low: u32, high: u32) -> u32 {
    let high = high.min(31);
    if low > high {
        return 0;
    }
    let width = high - low + 1;
    let shifted = value >> low;
    if width >= 32 {
        shifted
    } else {
        shifted & ((1u32 << width) - 1)
    }
}

/// Test a single bit of `value`.
pub fn bit(value: u32, index: u32) -> bool {
    index < 32 && (value >> index) & 1 == 1
}

/// The four registers returned by one (leaf, subleaf) query.
///
/// Serialized as `[eax, ebx, ecx, edx]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct RegisterSet {
    /// Returned in EAX.
    pub eax: u32,
    /// Returned in EBX.
    pub ebx: u32,
    /// Returned in ECX.
    pub ecx: u32,
    /// Returned in EDX.
    pub edx: u32,
}

impl RegisterSet {
    pub const fn new(eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self { eax, ebx, ecx, edx }
    }

    /// Value of the given register.
    pub fn get(&self, register: Register) -> u32 {
        match register {
            Register::Eax => self.eax,
            Register::Ebx => self.ebx,
            Register::Ecx => self.ecx,
            Register::Edx => self.edx,
        }
    }
}

impl From<[u32; 4]> for RegisterSet {
    fn from(regs: [u32; 4]) -> Self {
        Self::new(regs[0], regs[1], regs[2], regs[3])
    }
}

impl From<RegisterSet> for [u32; 4] {
    fn from(regs: RegisterSet) -> Self {
        [regs.eax, regs.ebx, regs.ecx, regs.edx]
    }
}

/// Subleaf index → registers, ascending.
pub type Subleaves = BTreeMap<u32, RegisterSet>;

/// Leaf → subleaf → registers for one logical processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaves(BTreeMap<u32, Subleaves>);

impl Leaves {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient when assembling fixtures.
    pub fn with(mut self, leaf: u32, subleaf: u32, regs: RegisterSet) -> Self {
        self.insert(leaf, subleaf, regs);
        self
    }

    /// Insert (or replace) the registers for a (leaf, subleaf) pair.
    pub fn insert(&mut self, leaf: u32, subleaf: u32, regs: RegisterSet) {
        self.0.entry(leaf).or_default().insert(subleaf, regs);
    }

    /// Registers for a (leaf, subleaf) pair, if captured.
    pub fn get(&self, leaf: u32, subleaf: u32) -> Option<&RegisterSet> {
        self.0.get(&leaf).and_then(|s| s.get(&subleaf))
    }

    /// All captured subleaves of a leaf.
    pub fn subleaves(&self, leaf: u32) -> Option<&Subleaves> {
        self.0.get(&leaf)
    }

    pub fn contains_leaf(&self, leaf: u32) -> bool {
        self.0.contains_key(&leaf)
    }

    /// Iterate leaves in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Subleaves)> {
        self.0.iter().map(|(leaf, subs)| (*leaf, subs))
    }
}
