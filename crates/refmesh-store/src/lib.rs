//! Storage driver boundary for refmesh.
//!
//! refmesh never executes queries itself. Everything that touches stored
//! data goes through the [`Driver`] trait: find, count, distinct, save,
//! remove, and an optional streaming find.
//!
//! # Backends
//!
//! - [`InMemoryDriver`] -- map-based driver for tests and embedding
//!
//! # Design Rules
//!
//! 1. One call is one round-trip. There are no server-side joins.
//! 2. A driver may populate single-segment reference paths natively; deeper
//!    paths are resolved by the caller, one hop per fetch.
//! 3. Saved records are always dehydrated (references stored as ids).
//! 4. All failures are returned as [`DriverError`], never silently ignored.

pub mod conditions;
pub mod error;
pub mod memory;
pub mod options;
pub mod traits;

pub use conditions::{Conditions, Filter};
pub use error::{DriverError, DriverResult};
pub use memory::InMemoryDriver;
pub use options::{FindOptions, SortOrder};
pub use traits::{Driver, RawStream};
