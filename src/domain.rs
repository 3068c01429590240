//! Domain models for verification test libraries.
//!
//! This module contains the core record types, the snapshot container with
//! its relationship resolution and fingerprinting, and the comparison that
//! classifies two snapshots into removed, added, modified and unchanged
//! records.

/// Record names.
pub mod name;
pub use name::{InvalidNameError, Name};

/// Opaque record content and its canonical form.
pub mod content;
pub use content::Content;

/// The test case selection query language.
pub mod query;
pub use query::{EvaluateError, Query, SyntaxError};

/// Selections combining a direct list with an optional query.
pub mod selection;
pub use selection::{Selection, SelectionError};

/// Test case domain model.
pub mod test_case;
pub use test_case::TestCase;

/// Requirement domain model.
pub mod requirement;
pub use requirement::Requirement;

/// Test plan domain model.
pub mod test_plan;
pub use test_plan::TestPlan;

/// Snapshots, relationship resolution and fingerprinting.
pub mod library;
pub use library::{CycleError, Fingerprints, Library, RecordKind, Resolution, ResolveError};

/// Snapshot comparison.
pub mod diff;
pub use diff::{LibraryDiff, RecordSets, diff};

mod config;
pub use config::Config;
