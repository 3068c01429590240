use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use nonempty::NonEmpty;
use once_cell::sync::OnceCell;
use petgraph::{
    algo::{is_cyclic_directed, tarjan_scc},
    prelude::DiGraphMap,
};
use rayon::prelude::*;
use tracing::instrument;

use super::{
    name::Name,
    query::{EvaluateError, SyntaxError},
    requirement::Requirement,
    selection::SelectionError,
    test_case::TestCase,
    test_plan::TestPlan,
};

/// An immutable snapshot of a test library.
///
/// Holds every record of the three kinds, keyed by name within each kind.
/// Relationship resolution and fingerprints are derived lazily on first use
/// and cached for the lifetime of the snapshot; the records themselves are
/// never mutated.
#[derive(Debug)]
pub struct Library {
    test_cases: BTreeMap<Name, TestCase>,
    requirements: BTreeMap<Name, Requirement>,
    test_plans: BTreeMap<Name, TestPlan>,
    resolution: OnceCell<Resolution>,
    fingerprints: OnceCell<Fingerprints>,
}

impl Library {
    /// Builds a snapshot from per-kind record maps.
    #[must_use]
    pub const fn new(
        test_cases: BTreeMap<Name, TestCase>,
        requirements: BTreeMap<Name, Requirement>,
        test_plans: BTreeMap<Name, TestPlan>,
    ) -> Self {
        Self {
            test_cases,
            requirements,
            test_plans,
            resolution: OnceCell::new(),
            fingerprints: OnceCell::new(),
        }
    }

    /// The test cases of this snapshot.
    #[must_use]
    pub const fn test_cases(&self) -> &BTreeMap<Name, TestCase> {
        &self.test_cases
    }

    /// The requirements of this snapshot.
    #[must_use]
    pub const fn requirements(&self) -> &BTreeMap<Name, Requirement> {
        &self.requirements
    }

    /// The test plans of this snapshot.
    #[must_use]
    pub const fn test_plans(&self) -> &BTreeMap<Name, TestPlan> {
        &self.test_plans
    }

    /// The resolved relationship sets of this snapshot.
    ///
    /// Computed on first use and cached; queries are parsed at most once per
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns a `ResolveError` when a record's query fails to parse or
    /// evaluate, or when the test plan composition graph contains a cycle.
    pub fn resolution(&self) -> Result<&Resolution, ResolveError> {
        self.resolution.get_or_try_init(|| self.resolve())
    }

    /// The fingerprints of every record in this snapshot.
    ///
    /// Computed on first use and cached. Fingerprinting is parallelized
    /// across records; each record sees only its own fields and its resolved
    /// relationship names.
    ///
    /// # Errors
    ///
    /// Returns a `ResolveError` when relationship resolution fails; see
    /// [`Library::resolution`].
    pub fn fingerprints(&self) -> Result<&Fingerprints, ResolveError> {
        self.fingerprints.get_or_try_init(|| {
            let resolution = self.resolution()?;
            Ok(self.compute_fingerprints(resolution))
        })
    }

    /// Lists the cycles in the test plan composition graph.
    ///
    /// Each cycle is reported once as a sorted group of plan names; a plan
    /// referencing itself forms a group of one. The groups themselves are
    /// sorted. References to absent plans cannot contribute to a cycle.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<Name>> {
        let names: Vec<&Name> = self.test_plans.keys().collect();
        let indices: BTreeMap<&Name, usize> = names.iter().copied().zip(0..).collect();

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..names.len() {
            graph.add_node(index);
        }
        for (parent, plan) in self.test_plans.values().enumerate() {
            for child in &plan.children {
                if let Some(&child_index) = indices.get(child) {
                    graph.add_edge(parent, child_index, ());
                }
            }
        }

        if !is_cyclic_directed(&graph) {
            return Vec::new();
        }

        let mut cycles: Vec<Vec<Name>> = tarjan_scc(&graph)
            .into_iter()
            .filter_map(|component| {
                if component.len() > 1 {
                    let mut group: Vec<Name> =
                        component.iter().map(|&index| names[index].clone()).collect();
                    group.sort();
                    Some(group)
                } else {
                    let node = component[0];
                    graph
                        .contains_edge(node, node)
                        .then(|| vec![names[node].clone()])
                }
            })
            .collect();

        cycles.sort();
        cycles
    }

    #[instrument(level = "debug", skip(self))]
    fn resolve(&self) -> Result<Resolution, ResolveError> {
        let mut verifiers = BTreeMap::new();
        let mut verified_by: BTreeMap<Name, BTreeSet<Name>> = self
            .test_cases
            .keys()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();

        for (name, requirement) in &self.requirements {
            let resolved = requirement
                .verified_by
                .resolve(&self.test_cases)
                .map_err(|error| selection_error(RecordKind::Requirement, name, error))?;
            for case in &resolved {
                if let Some(entry) = verified_by.get_mut(case) {
                    entry.insert(name.clone());
                }
            }
            verifiers.insert(name.clone(), resolved);
        }

        // Membership resolution assumes an acyclic composition graph.
        if let Some(cycles) = NonEmpty::from_vec(self.cycles()) {
            return Err(CycleError { cycles }.into());
        }

        let mut members = BTreeMap::new();
        let mut children = BTreeMap::new();
        for (name, plan) in &self.test_plans {
            let resolved = plan
                .test_cases
                .resolve(&self.test_cases)
                .map_err(|error| selection_error(RecordKind::TestPlan, name, error))?;
            members.insert(name.clone(), resolved);

            let existing = plan
                .children
                .iter()
                .filter(|child| self.test_plans.contains_key(*child))
                .cloned()
                .collect();
            children.insert(name.clone(), existing);
        }

        Ok(Resolution {
            verifiers,
            verified_by,
            members,
            children,
        })
    }

    #[instrument(level = "debug", skip_all)]
    fn compute_fingerprints(&self, resolution: &Resolution) -> Fingerprints {
        let empty = BTreeSet::new();

        let test_cases = self
            .test_cases
            .par_iter()
            .map(|(name, case)| {
                let verified_by = resolution.verified_by.get(name).unwrap_or(&empty);
                (name.clone(), case.fingerprint(verified_by))
            })
            .collect();

        let requirements = self
            .requirements
            .par_iter()
            .map(|(name, requirement)| {
                let verifiers = resolution.verifiers.get(name).unwrap_or(&empty);
                (name.clone(), requirement.fingerprint(verifiers))
            })
            .collect();

        let test_plans = self
            .test_plans
            .par_iter()
            .map(|(name, plan)| {
                let members = resolution.members.get(name).unwrap_or(&empty);
                (name.clone(), plan.fingerprint(members))
            })
            .collect();

        Fingerprints {
            test_cases,
            requirements,
            test_plans,
        }
    }
}

/// Resolved relationship sets of one snapshot.
///
/// Every set contains only names that exist in the snapshot; dangling
/// references have already been filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Per requirement, the test cases selected by its `verified_by`.
    pub verifiers: BTreeMap<Name, BTreeSet<Name>>,

    /// Per test case, the requirements whose `verified_by` selects it.
    /// Every test case of the snapshot has an entry, possibly empty.
    pub verified_by: BTreeMap<Name, BTreeSet<Name>>,

    /// Per test plan, the test cases selected by its acceptance criteria.
    pub members: BTreeMap<Name, BTreeSet<Name>>,

    /// Per test plan, its child plans that exist in the snapshot.
    pub children: BTreeMap<Name, BTreeSet<Name>>,
}

/// Fingerprints of every record of one snapshot, keyed by name per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    /// Test case fingerprints.
    pub test_cases: BTreeMap<Name, String>,

    /// Requirement fingerprints.
    pub requirements: BTreeMap<Name, String>,

    /// Test plan fingerprints.
    pub test_plans: BTreeMap<Name, String>,
}

/// The three record kinds of a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordKind {
    /// An executable verification procedure.
    TestCase,
    /// A statement of what must be verified.
    Requirement,
    /// A grouping of test cases into an executable campaign.
    TestPlan,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Self::TestCase => "test case",
            Self::Requirement => "requirement",
            Self::TestPlan => "test plan",
        };
        f.write_str(text)
    }
}

/// Errors that abort relationship resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A record's query failed to parse.
    #[error("invalid query on {kind} '{name}'")]
    Syntax {
        /// Kind of the record owning the query.
        kind: RecordKind,
        /// Name of the record owning the query.
        name: Name,
        /// The underlying parse failure.
        #[source]
        source: SyntaxError,
    },

    /// A record's query could not be evaluated.
    #[error("cannot evaluate the query on {kind} '{name}'")]
    Evaluate {
        /// Kind of the record owning the query.
        kind: RecordKind,
        /// Name of the record owning the query.
        name: Name,
        /// The underlying evaluation failure.
        #[source]
        source: EvaluateError,
    },

    /// The test plan composition graph contains a cycle.
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Error raised when test plan child references form one or more cycles.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub struct CycleError {
    /// The cycles found, one sorted group of plan names each.
    pub cycles: NonEmpty<Vec<Name>>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "test plan composition contains a cycle: ")?;
        let mut first = true;
        for group in self.cycles.iter() {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            let names: Vec<&str> = group.iter().map(Name::as_str).collect();
            write!(f, "{}", names.join(" -> "))?;
        }
        Ok(())
    }
}

fn selection_error(kind: RecordKind, name: &Name, error: SelectionError) -> ResolveError {
    match error {
        SelectionError::Syntax(source) => ResolveError::Syntax {
            kind,
            name: name.clone(),
            source,
        },
        SelectionError::Evaluate(source) => ResolveError::Evaluate {
            kind,
            name: name.clone(),
            source,
        },
    }
}
