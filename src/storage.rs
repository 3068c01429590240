pub mod directory;
mod record;

pub use directory::{Directory, DirectoryLoadError, Loaded, RecordPaths, Unloaded};
pub use record::LoadError;
