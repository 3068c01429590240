use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{
    name::Name,
    query::{EvaluateError, Query, SyntaxError},
    test_case::TestCase,
};

/// A test-case selection: an explicit name list, a query, or both.
///
/// This is the shape shared by a requirement's `verified_by` block and a
/// test plan's `acceptance_criteria.test_cases` block. Either part may be
/// absent; an entirely absent selection resolves to the empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Explicitly named test cases.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub direct_list: BTreeSet<Name>,

    /// Query text selecting further test cases dynamically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Selection {
    /// Resolves the selection against the test cases of one snapshot.
    ///
    /// Returns the union of the explicit names that exist in `cases` and the
    /// names of every case the query matches. Explicit names that do not
    /// exist are silently dropped; that filtering is what lets a removed
    /// test case cascade into the records that referenced it. The query is
    /// parsed once per call, not once per case.
    ///
    /// # Errors
    ///
    /// Returns a `SelectionError` when the query fails to parse or cannot be
    /// evaluated against a test case.
    pub fn resolve(
        &self,
        cases: &BTreeMap<Name, TestCase>,
    ) -> Result<BTreeSet<Name>, SelectionError> {
        let mut selected: BTreeSet<Name> = self
            .direct_list
            .iter()
            .filter(|name| cases.contains_key(*name))
            .cloned()
            .collect();

        if let Some(text) = &self.query {
            let query = Query::parse(text)?;
            for (name, case) in cases {
                if query.matches(case)? {
                    selected.insert(name.clone());
                }
            }
        }

        Ok(selected)
    }

    /// True when the selection names nothing and carries no query.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.direct_list.is_empty() && self.query.is_none()
    }
}

/// Errors raised while resolving a selection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The query text failed to parse.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The query could not be evaluated against a test case.
    #[error(transparent)]
    Evaluate(#[from] EvaluateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Content;

    fn name(s: &str) -> Name {
        Name::try_from(s).unwrap()
    }

    fn case(tags: &[&str], priority: i64) -> TestCase {
        TestCase {
            tags: tags.iter().map(ToString::to_string).collect(),
            priority,
            content: Content::default(),
        }
    }

    fn cases() -> BTreeMap<Name, TestCase> {
        BTreeMap::from([
            (name("Ignition"), case(&["electronics", "ignition"], 2)),
            (name("Engine quality"), case(&["engine"], 4)),
            (name("Engine fuel consumption"), case(&["engine"], 5)),
        ])
    }

    fn names(list: &[&str]) -> BTreeSet<Name> {
        list.iter().map(|s| name(s)).collect()
    }

    #[test]
    fn direct_list_alone() {
        let selection = Selection {
            direct_list: names(&["Ignition"]),
            query: None,
        };
        assert_eq!(selection.resolve(&cases()).unwrap(), names(&["Ignition"]));
    }

    #[test]
    fn query_alone() {
        let selection = Selection {
            direct_list: BTreeSet::new(),
            query: Some(r#""engine" in tc.tags"#.to_string()),
        };
        assert_eq!(
            selection.resolve(&cases()).unwrap(),
            names(&["Engine fuel consumption", "Engine quality"])
        );
    }

    #[test]
    fn direct_list_and_query_union() {
        let selection = Selection {
            direct_list: names(&["Ignition"]),
            query: Some("tc.priority > 4".to_string()),
        };
        assert_eq!(
            selection.resolve(&cases()).unwrap(),
            names(&["Engine fuel consumption", "Ignition"])
        );
    }

    #[test]
    fn dangling_names_are_dropped() {
        let selection = Selection {
            direct_list: names(&["Ignition", "Retired case"]),
            query: None,
        };
        assert_eq!(selection.resolve(&cases()).unwrap(), names(&["Ignition"]));
    }

    #[test]
    fn empty_selection_resolves_to_nothing() {
        let selection = Selection::default();
        assert!(selection.is_empty());
        assert!(selection.resolve(&cases()).unwrap().is_empty());
    }

    #[test]
    fn broken_query_surfaces_a_syntax_error() {
        let selection = Selection {
            direct_list: BTreeSet::new(),
            query: Some("tc.priority >".to_string()),
        };
        assert!(matches!(
            selection.resolve(&cases()),
            Err(SelectionError::Syntax(_))
        ));
    }

    #[test]
    fn unknown_attribute_surfaces_an_evaluation_error() {
        let selection = Selection {
            direct_list: BTreeSet::new(),
            query: Some(r#""a" in tc.owner"#.to_string()),
        };
        assert!(matches!(
            selection.resolve(&cases()),
            Err(SelectionError::Evaluate(_))
        ));
    }

    #[test]
    fn deserializes_with_both_parts_optional() {
        let full: Selection =
            serde_yaml::from_str("direct_list:\n  - Ignition\nquery: tc.priority > 1\n").unwrap();
        assert_eq!(full.direct_list, names(&["Ignition"]));
        assert_eq!(full.query.as_deref(), Some("tc.priority > 1"));

        let list_only: Selection = serde_yaml::from_str("direct_list:\n  - Ignition\n").unwrap();
        assert!(list_only.query.is_none());

        let query_only: Selection = serde_yaml::from_str("query: tc.priority > 1\n").unwrap();
        assert!(query_only.direct_list.is_empty());
    }
}
