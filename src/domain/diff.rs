use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{
    library::{Library, ResolveError},
    name::Name,
};

/// Compares two snapshots and classifies every record name of every kind.
///
/// For each kind independently, a name present only in `base` is `removed`,
/// a name present only in `candidate` is `added`, and a name present in both
/// is `modified` or `unchanged` according to its fingerprints. The four sets
/// partition the union of both snapshots' names.
///
/// # Errors
///
/// Returns a `ResolveError` when either snapshot fails relationship
/// resolution (broken query or cyclic plan composition).
pub fn diff(base: &Library, candidate: &Library) -> Result<LibraryDiff, ResolveError> {
    let base = base.fingerprints()?;
    let candidate = candidate.fingerprints()?;

    let plans = classify(&base.test_plans, &candidate.test_plans);
    let requirements = classify(&base.requirements, &candidate.requirements);
    let cases = classify(&base.test_cases, &candidate.test_cases);

    Ok(LibraryDiff {
        removed: RecordSets {
            test_plans: plans.removed,
            requirements: requirements.removed,
            test_cases: cases.removed,
        },
        added: RecordSets {
            test_plans: plans.added,
            requirements: requirements.added,
            test_cases: cases.added,
        },
        modified: RecordSets {
            test_plans: plans.modified,
            requirements: requirements.modified,
            test_cases: cases.modified,
        },
        unchanged: RecordSets {
            test_plans: plans.unchanged,
            requirements: requirements.unchanged,
            test_cases: cases.unchanged,
        },
    })
}

/// The four-way classification produced by [`diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryDiff {
    /// Records present only in the base snapshot.
    pub removed: RecordSets,

    /// Records present only in the candidate snapshot.
    pub added: RecordSets,

    /// Records present in both snapshots with differing fingerprints.
    pub modified: RecordSets,

    /// Records present in both snapshots with identical fingerprints.
    pub unchanged: RecordSets,
}

impl LibraryDiff {
    /// True when the two snapshots agree on every record.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.modified.is_empty()
    }
}

/// Record names of one classification, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordSets {
    /// Test plan names.
    #[serde(rename = "testplans")]
    pub test_plans: BTreeSet<Name>,

    /// Requirement names.
    pub requirements: BTreeSet<Name>,

    /// Test case names.
    #[serde(rename = "testcases")]
    pub test_cases: BTreeSet<Name>,
}

impl RecordSets {
    /// True when no record of any kind fell into this classification.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.test_plans.is_empty() && self.requirements.is_empty() && self.test_cases.is_empty()
    }

    /// Number of records across all kinds in this classification.
    #[must_use]
    pub fn len(&self) -> usize {
        self.test_plans.len() + self.requirements.len() + self.test_cases.len()
    }
}

#[derive(Debug, Default)]
struct Classified {
    removed: BTreeSet<Name>,
    added: BTreeSet<Name>,
    modified: BTreeSet<Name>,
    unchanged: BTreeSet<Name>,
}

fn classify(base: &BTreeMap<Name, String>, candidate: &BTreeMap<Name, String>) -> Classified {
    let mut classified = Classified::default();

    for (name, fingerprint) in base {
        match candidate.get(name) {
            None => {
                classified.removed.insert(name.clone());
            }
            Some(other) if other == fingerprint => {
                classified.unchanged.insert(name.clone());
            }
            Some(_) => {
                classified.modified.insert(name.clone());
            }
        }
    }

    for name in candidate.keys() {
        if !base.contains_key(name) {
            classified.added.insert(name.clone());
        }
    }

    classified
}
