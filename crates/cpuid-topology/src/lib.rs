//! Machine topology reconstruction.
//!
//! Turns a flat map of per-processor register snapshots into:
//! - **Levels:** the thread/core/.../package id layout and its mask widths
//! - **Hierarchy:** package → physical core → logical core
//! - **Caches:** every cache descriptor with its sharing groups
//!
//! Inconsistent input never aborts a build; problems are recorded as
//! [`TopologyIssue`]s on the resulting [`SystemTopology`].

pub mod builder;
pub mod cache;
pub mod issue;
pub mod level;
pub mod system;

pub use builder::build_topology;
pub use cache::{Cache, CacheDescriptor, CacheKey, CacheType};
pub use issue::TopologyIssue;
pub use level::{LevelDescription, LevelType, TopologySource};
pub use system::{CacheRef, LogicalCore, Package, PhysicalCore, SystemTopology};
