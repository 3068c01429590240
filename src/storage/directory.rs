//! A filesystem backed store of test library records.
//!
//! The [`Directory`] loads every record file under a root directory into an
//! in-memory [`Library`] snapshot, remembering the source path of each
//! record for reporting.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use nonempty::NonEmpty;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;
use walkdir::WalkDir;

use crate::{
    domain::{Config, Library, Name, RecordKind},
    storage::record::{self, LoadError, Record},
};

/// State of a directory whose records have been loaded into memory.
#[derive(Debug)]
pub struct Loaded {
    library: Library,
    paths: RecordPaths,
    config: Config,
}

/// State of a directory that has not been read yet.
#[derive(Debug, PartialEq, Eq)]
pub struct Unloaded;

/// A filesystem backed store of test library records.
#[derive(Debug)]
pub struct Directory<S> {
    /// The root of the directory records are stored in.
    root: PathBuf,
    state: S,
}

impl<S> Directory<S> {
    /// The root of the directory records are stored in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Directory<Unloaded> {
    /// Opens a directory at the given path.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
            state: Unloaded,
        }
    }

    /// Loads every record file under the root into a snapshot.
    ///
    /// Files and directories whose names start with `.` are skipped. Other
    /// files must carry one of the record extensions (`.tc.yaml`,
    /// `.req.yaml`, `.plan.yaml`) unless the configuration allows
    /// unrecognised files, in which case they are ignored.
    ///
    /// # Errors
    ///
    /// Fails when the configuration file is malformed, when an unrecognised
    /// file is present and not allowed, when any record file cannot be read
    /// or parsed, or when two records of the same kind share a name.
    #[instrument(skip(self))]
    pub fn load_all(self) -> Result<Directory<Loaded>, DirectoryLoadError> {
        let config = load_config(&self.root)?;
        let (record_paths, unrecognised) = discover(&self.root);

        if !config.allow_unrecognised && !unrecognised.is_empty() {
            return Err(DirectoryLoadError::Unrecognised(unrecognised));
        }

        let (records, failures): (Vec<_>, Vec<_>) = record_paths
            .par_iter()
            .map(|(kind, path)| {
                record::load(path, *kind, config.default_priority)
                    .map(|record| (path.clone(), record))
            })
            .partition(Result::is_ok);

        let records: Vec<_> = records.into_iter().map(Result::unwrap).collect();
        let failures: Vec<_> = failures.into_iter().map(Result::unwrap_err).collect();

        if let Some(failures) = NonEmpty::from_vec(failures) {
            return Err(DirectoryLoadError::Invalid(failures));
        }

        let mut cases = BTreeMap::new();
        let mut requirements = BTreeMap::new();
        let mut plans = BTreeMap::new();
        let mut paths = RecordPaths::default();

        for (path, parsed) in records {
            match parsed {
                Record::Case(name, case) => insert(
                    &mut cases,
                    &mut paths.test_cases,
                    RecordKind::TestCase,
                    name,
                    case,
                    path,
                )?,
                Record::Requirement(name, requirement) => insert(
                    &mut requirements,
                    &mut paths.requirements,
                    RecordKind::Requirement,
                    name,
                    requirement,
                    path,
                )?,
                Record::Plan(name, plan) => insert(
                    &mut plans,
                    &mut paths.test_plans,
                    RecordKind::TestPlan,
                    name,
                    plan,
                    path,
                )?,
            }
        }

        tracing::debug!(
            "Loaded {} records from {}",
            paths.len(),
            self.root.display()
        );

        Ok(Directory {
            root: self.root,
            state: Loaded {
                library: Library::new(cases, requirements, plans),
                paths,
                config,
            },
        })
    }
}

impl Directory<Loaded> {
    /// The loaded snapshot.
    #[must_use]
    pub const fn library(&self) -> &Library {
        &self.state.library
    }

    /// Source path of every loaded record, by kind.
    #[must_use]
    pub const fn paths(&self) -> &RecordPaths {
        &self.state.paths
    }

    /// The configuration in effect for this directory.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.state.config
    }
}

/// Source path of every loaded record, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPaths {
    /// Test case paths by record name.
    pub test_cases: BTreeMap<Name, PathBuf>,

    /// Requirement paths by record name.
    pub requirements: BTreeMap<Name, PathBuf>,

    /// Test plan paths by record name.
    pub test_plans: BTreeMap<Name, PathBuf>,
}

impl RecordPaths {
    /// Finds a record's kind and source path by name.
    ///
    /// Test cases are searched first, then requirements, then test plans.
    #[must_use]
    pub fn find(&self, name: &Name) -> Option<(RecordKind, &Path)> {
        self.test_cases
            .get(name)
            .map(|path| (RecordKind::TestCase, path.as_path()))
            .or_else(|| {
                self.requirements
                    .get(name)
                    .map(|path| (RecordKind::Requirement, path.as_path()))
            })
            .or_else(|| {
                self.test_plans
                    .get(name)
                    .map(|path| (RecordKind::TestPlan, path.as_path()))
            })
    }

    /// Total number of loaded records across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.test_cases.len() + self.requirements.len() + self.test_plans.len()
    }

    /// True when the directory contained no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An error raised while loading a library directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryLoadError {
    /// The configuration file is present but malformed.
    Config(String),

    /// Files under the root were not recognised as records.
    Unrecognised(Vec<PathBuf>),

    /// Record files could not be read or parsed.
    Invalid(NonEmpty<LoadError>),

    /// Two records of the same kind share a name.
    Duplicate {
        /// Kind of the colliding records.
        kind: RecordKind,
        /// The shared name.
        name: Name,
        /// Path of the record encountered first.
        first: PathBuf,
        /// Path of the record encountered second.
        second: PathBuf,
    },
}

impl fmt::Display for DirectoryLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_DISPLAY: usize = 5;

        match self {
            Self::Config(message) => write!(f, "{message}"),
            Self::Unrecognised(paths) => {
                write!(f, "Unrecognised files: ")?;
                for (i, path) in paths.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", path.display())?;
                }
                Ok(())
            }
            Self::Invalid(failures) => {
                write!(f, "failed to load record files: ")?;

                let total = failures.len();

                let displayed_paths: Vec<String> = failures
                    .iter()
                    .take(MAX_DISPLAY)
                    .map(|failure| failure.path().display().to_string())
                    .collect();

                let msg = displayed_paths.join(", ");

                if total <= MAX_DISPLAY {
                    write!(f, "{msg}")
                } else {
                    write!(f, "{msg}... (and {} more)", total - MAX_DISPLAY)
                }
            }
            Self::Duplicate {
                kind,
                name,
                first,
                second,
            } => write!(
                f,
                "duplicate {kind} '{name}': defined at {} and {}",
                first.display(),
                second.display()
            ),
        }
    }
}

fn load_config(root: &Path) -> Result<Config, DirectoryLoadError> {
    let path = root.join(".tlib").join("config.toml");
    if path.exists() {
        Config::load(&path).map_err(DirectoryLoadError::Config)
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

fn discover(root: &Path) -> (Vec<(RecordKind, PathBuf)>, Vec<PathBuf>) {
    let mut records = Vec::new();
    let mut unrecognised = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.file_name().to_str().and_then(record::classify) {
            Some(kind) => records.push((kind, entry.into_path())),
            None => unrecognised.push(entry.into_path()),
        }
    }

    (records, unrecognised)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn insert<T>(
    records: &mut BTreeMap<Name, T>,
    paths: &mut BTreeMap<Name, PathBuf>,
    kind: RecordKind,
    name: Name,
    record: T,
    path: PathBuf,
) -> Result<(), DirectoryLoadError> {
    if let Some(first) = paths.get(&name) {
        return Err(DirectoryLoadError::Duplicate {
            kind,
            name,
            first: first.clone(),
            second: path,
        });
    }
    paths.insert(name.clone(), path);
    records.insert(name, record);
    Ok(())
}
