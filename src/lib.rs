//! Change Tracking for Verification Test Libraries
//!
//! Records are YAML documents stored in a directory, loaded into an
//! in-memory library and compared snapshot against snapshot.

pub mod domain;
pub use domain::{
    Config, Content, Library, LibraryDiff, Name, RecordKind, RecordSets, Requirement, Resolution,
    ResolveError, Selection, TestCase, TestPlan, diff,
};

/// Filesystem storage and directory loading for records.
pub mod storage;
pub use storage::{Directory, DirectoryLoadError, Loaded, RecordPaths, Unloaded};
