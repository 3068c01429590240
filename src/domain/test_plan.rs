use std::collections::BTreeSet;

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use super::{
    content::{CanonicalValue, Content},
    name::Name,
    selection::Selection,
};

/// A grouping of test cases into an executable campaign.
///
/// Plans compose structurally through `children`, but composition never
/// propagates content: a parent's fingerprint does not depend on its
/// children in any way, only the child-reference *graph* is checked for
/// cycles at resolution time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestPlan {
    /// Selection of the test cases this plan covers.
    pub test_cases: Selection,

    /// Names of child plans composed under this one.
    pub children: BTreeSet<Name>,

    /// Uninterpreted remainder of the document.
    pub content: Content,
}

impl TestPlan {
    /// Computes the fingerprint of this test plan.
    ///
    /// `members` is the resolved set of test case names selected by
    /// `test_cases`. As with requirements, the query text is hashed and the
    /// `direct_list` is not. Child plan names contribute nothing; deleting a
    /// child plan leaves every parent's fingerprint intact.
    #[must_use]
    pub fn fingerprint(&self, members: &BTreeSet<Name>) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData<'a> {
            content: CanonicalValue,
            query: Option<&'a str>,
            members: Vec<&'a str>,
        }

        let data = FingerprintData {
            content: self.content.canonical(),
            query: self.test_cases.query.as_deref(),
            members: members.iter().map(Name::as_str).collect(),
        };

        let encoded = borsh::to_vec(&data).expect("this should never fail");
        let hash = Sha256::digest(encoded);
        format!("{hash:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::try_from(s).unwrap()
    }

    fn names(list: &[&str]) -> BTreeSet<Name> {
        list.iter().map(|s| name(s)).collect()
    }

    fn sub_plan_a() -> TestPlan {
        TestPlan {
            test_cases: Selection {
                direct_list: names(&["Engine fuel consumption"]),
                query: Some(r#""engine" in tc.tags"#.to_string()),
            },
            children: BTreeSet::new(),
            content: serde_yaml::from_str("description: Engine acceptance.\n").unwrap(),
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        let members = names(&["Engine fuel consumption", "Engine quality"]);
        assert_eq!(
            sub_plan_a().fingerprint(&members),
            sub_plan_a().fingerprint(&members)
        );
    }

    #[test]
    fn children_do_not_change_the_fingerprint() {
        let members = names(&["Engine quality"]);
        let mut composed = sub_plan_a();
        composed.children = names(&["Plan B", "Main parent plan"]);
        assert_eq!(
            sub_plan_a().fingerprint(&members),
            composed.fingerprint(&members)
        );
    }

    #[test]
    fn query_text_changes_the_fingerprint() {
        let members = names(&["Engine fuel consumption", "Engine quality"]);
        let mut edited = sub_plan_a();
        edited.test_cases.query =
            Some(r#""engine" in tc.tags and "disabled" not in tc.tags"#.to_string());
        assert_ne!(
            sub_plan_a().fingerprint(&members),
            edited.fingerprint(&members)
        );
    }

    #[test]
    fn resolved_member_names_change_the_fingerprint() {
        let plan = sub_plan_a();
        assert_ne!(
            plan.fingerprint(&names(&["Engine fuel consumption", "Engine quality"])),
            plan.fingerprint(&names(&["Engine quality"]))
        );
    }

    #[test]
    fn content_changes_the_fingerprint() {
        let members = names(&["Engine quality"]);
        let mut edited = sub_plan_a();
        edited.content = serde_yaml::from_str("description: Transmission acceptance.\n").unwrap();
        assert_ne!(
            sub_plan_a().fingerprint(&members),
            edited.fingerprint(&members)
        );
    }
}
