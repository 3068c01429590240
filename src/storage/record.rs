//! The on-disk YAML document of each record kind.
//!
//! A record file is a single YAML mapping. The typed fields (`name`, tags,
//! priorities, relationship selections) are lifted out during parsing;
//! every remaining key is preserved as opaque [`Content`].

use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::domain::{Content, Name, RecordKind, Requirement, Selection, TestCase, TestPlan};

const CASE_SUFFIX: &str = ".tc.yaml";
const REQUIREMENT_SUFFIX: &str = ".req.yaml";
const PLAN_SUFFIX: &str = ".plan.yaml";

/// Determines the record kind a file name declares, if any.
///
/// The kind is encoded in the double extension; the stem carries no meaning.
pub(crate) fn classify(file_name: &str) -> Option<RecordKind> {
    if file_name.ends_with(CASE_SUFFIX) {
        Some(RecordKind::TestCase)
    } else if file_name.ends_with(REQUIREMENT_SUFFIX) {
        Some(RecordKind::Requirement)
    } else if file_name.ends_with(PLAN_SUFFIX) {
        Some(RecordKind::TestPlan)
    } else {
        None
    }
}

/// A parsed record document, keyed by the name the document declares.
#[derive(Debug)]
pub(crate) enum Record {
    Case(Name, TestCase),
    Requirement(Name, Requirement),
    Plan(Name, TestPlan),
}

/// Reads and parses a single record file.
pub(crate) fn load(
    path: &Path,
    kind: RecordKind,
    default_priority: i64,
) -> Result<Record, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, kind, default_priority).map_err(|source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn parse(
    text: &str,
    kind: RecordKind,
    default_priority: i64,
) -> Result<Record, serde_yaml::Error> {
    let record = match kind {
        RecordKind::TestCase => {
            let file: CaseFile = serde_yaml::from_str(text)?;
            let (name, case) = file.into_record(default_priority);
            Record::Case(name, case)
        }
        RecordKind::Requirement => {
            let file: RequirementFile = serde_yaml::from_str(text)?;
            let (name, requirement) = file.into_record();
            Record::Requirement(name, requirement)
        }
        RecordKind::TestPlan => {
            let file: PlanFile = serde_yaml::from_str(text)?;
            let (name, plan) = file.into_record();
            Record::Plan(name, plan)
        }
    };
    Ok(record)
}

/// An error encountered while reading a single record file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The file is not a valid record document.
    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        /// Path of the invalid file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoadError {
    /// Path of the file that failed to load.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Yaml { path, .. } => path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    name: Name,
    #[serde(default)]
    tags: BTreeSet<String>,
    priority: Option<i64>,
    #[serde(flatten)]
    content: Content,
}

impl CaseFile {
    fn into_record(self, default_priority: i64) -> (Name, TestCase) {
        let case = TestCase {
            tags: self.tags,
            priority: self.priority.unwrap_or(default_priority),
            content: self.content,
        };
        (self.name, case)
    }
}

#[derive(Debug, Deserialize)]
struct RequirementFile {
    name: Name,
    #[serde(default)]
    verified_by: Selection,
    #[serde(flatten)]
    content: Content,
}

impl RequirementFile {
    fn into_record(self) -> (Name, Requirement) {
        let requirement = Requirement {
            verified_by: self.verified_by,
            content: self.content,
        };
        (self.name, requirement)
    }
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    name: Name,
    #[serde(default)]
    acceptance_criteria: AcceptanceCriteria,
    #[serde(default)]
    test_plans: BTreeSet<Name>,
    #[serde(flatten)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct AcceptanceCriteria {
    #[serde(default)]
    test_cases: Selection,
}

impl PlanFile {
    fn into_record(self) -> (Name, TestPlan) {
        let plan = TestPlan {
            test_cases: self.acceptance_criteria.test_cases,
            children: self.test_plans,
            content: self.content,
        };
        (self.name, plan)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("ignition.tc.yaml", Some(RecordKind::TestCase); "test case")]
    #[test_case("running.req.yaml", Some(RecordKind::Requirement); "requirement")]
    #[test_case("main.plan.yaml", Some(RecordKind::TestPlan); "test plan")]
    #[test_case("notes.yaml", None; "plain yaml")]
    #[test_case("notes.txt", None; "other extension")]
    #[test_case("tc.yaml", None; "suffix without stem")]
    #[test_case("archive.tc.yaml.bak", None; "suffix not at end")]
    fn classifies_file_names(file_name: &str, expected: Option<RecordKind>) {
        assert_eq!(classify(file_name), expected);
    }

    #[test]
    fn parses_a_full_test_case_document() {
        let text = "name: Ignition\ntags:\n  - electronics\n  - ignition\npriority: 2\ninstructions:\n  steps:\n    - step: Turn the key\n";

        let Record::Case(name, case) = parse(text, RecordKind::TestCase, 1).unwrap() else {
            panic!("expected a test case");
        };

        assert_eq!(name.as_str(), "Ignition");
        assert_eq!(
            case.tags,
            BTreeSet::from(["electronics".to_string(), "ignition".to_string()])
        );
        assert_eq!(case.priority, 2);

        // The typed fields are lifted out; only `instructions` remains as
        // opaque content.
        let expected: Content =
            serde_yaml::from_str("instructions:\n  steps:\n    - step: Turn the key\n").unwrap();
        assert_eq!(case.content, expected);
    }

    #[test]
    fn minimal_test_case_takes_the_default_priority() {
        let Record::Case(name, case) = parse("name: Braking\n", RecordKind::TestCase, 7).unwrap()
        else {
            panic!("expected a test case");
        };

        assert_eq!(name.as_str(), "Braking");
        assert!(case.tags.is_empty());
        assert_eq!(case.priority, 7);
        assert!(case.content.is_empty());
    }

    #[test]
    fn parses_a_requirement_with_both_selection_forms() {
        let text = "name: Running\nverified_by:\n  direct_list:\n    - Ignition\n  query: '\"engine\" in tc.tags'\ntext: The vehicle shall run.\n";

        let Record::Requirement(name, requirement) =
            parse(text, RecordKind::Requirement, 1).unwrap()
        else {
            panic!("expected a requirement");
        };

        assert_eq!(name.as_str(), "Running");
        assert_eq!(requirement.verified_by.direct_list.len(), 1);
        assert_eq!(
            requirement.verified_by.query.as_deref(),
            Some(r#""engine" in tc.tags"#)
        );
        assert!(!requirement.content.is_empty());
    }

    #[test]
    fn requirement_without_selection_is_valid() {
        let Record::Requirement(_, requirement) =
            parse("name: Styling\n", RecordKind::Requirement, 1).unwrap()
        else {
            panic!("expected a requirement");
        };

        assert!(requirement.verified_by.is_empty());
    }

    #[test]
    fn parses_a_test_plan_with_children() {
        let text = "name: Main parent plan\nacceptance_criteria:\n  test_cases:\n    query: '\"ignition\" in tc.tags'\ntest_plans:\n  - Sub plan A\n  - Plan B\ndescription: Full acceptance campaign.\n";

        let Record::Plan(name, plan) = parse(text, RecordKind::TestPlan, 1).unwrap() else {
            panic!("expected a test plan");
        };

        assert_eq!(name.as_str(), "Main parent plan");
        assert_eq!(plan.children.len(), 2);
        assert_eq!(
            plan.test_cases.query.as_deref(),
            Some(r#""ignition" in tc.tags"#)
        );
        assert!(!plan.content.is_empty());
    }

    #[test]
    fn typed_fields_never_leak_into_content() {
        let text = "name: Sub plan A\nacceptance_criteria:\n  test_cases:\n    direct_list:\n      - Engine fuel consumption\ntest_plans: []\n";

        let Record::Plan(_, plan) = parse(text, RecordKind::TestPlan, 1).unwrap() else {
            panic!("expected a test plan");
        };

        assert!(plan.content.is_empty());
    }

    #[test]
    fn missing_name_is_rejected() {
        assert!(parse("tags: [engine]\n", RecordKind::TestCase, 1).is_err());
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(parse("name: '   '\n", RecordKind::TestCase, 1).is_err());
    }

    #[test]
    fn non_integer_priority_is_rejected() {
        assert!(parse("name: Ignition\npriority: high\n", RecordKind::TestCase, 1).is_err());
    }

    #[test]
    fn load_reports_the_failing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.tc.yaml");

        let error = load(&missing, RecordKind::TestCase, 1).unwrap_err();
        assert_eq!(error.path(), missing);
        assert!(error.to_string().contains("missing.tc.yaml"));
    }
}
