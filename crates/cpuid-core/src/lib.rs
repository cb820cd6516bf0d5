//! Data model for decoded CPUID output.
//!
//! A machine is described as a set of per-logical-processor register
//! snapshots. This crate provides:
//! - **Registers:** the leaf → subleaf → `[eax, ebx, ecx, edx]` mapping
//! - **Catalog:** static names and subleaf rules for known leaves
//! - **Vendor / Model:** signature matching and version-register decoding
//! - **Processor:** the immutable per-processor record
//! - **Snapshot:** the native JSON dump format

pub mod error;
pub mod leaf;
pub mod model;
pub mod processor;
pub mod registers;
pub mod snapshot;
pub mod vendor;

pub use error::{CoreError, Result};
pub use model::{Model, VersionInfo};
pub use processor::{Processor, ProcessorMap};
pub use registers::{Leaves, Register, RegisterSet, Subleaves};
pub use vendor::Vendor;
