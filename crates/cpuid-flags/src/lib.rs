//! Feature-flag selectors.
//!
//! A selector names one register field of one (leaf, subleaf) pair in the
//! Intel SDM notation, for example `CPUID.(EAX=07H,ECX=0):EBX.AVX2[bit 5]`.
//! [`parse`] and [`serialize`] convert between text and [`FlagSelector`];
//! `parse(&serialize(&s)) == Ok(s)` holds for every parsed selector.
//! [`evaluate`] reads the field from a processor record.

pub mod error;
pub mod evaluate;
pub mod lexer;
pub mod parse;
pub mod selector;

pub use error::{FlagError, Result};
pub use evaluate::{evaluate, evaluate_all, FlagValue};
pub use parse::parse;
pub use selector::{serialize, BitRange, FlagSelector};
