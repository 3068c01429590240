use std::collections::BTreeSet;

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use super::{
    content::{CanonicalValue, Content},
    name::Name,
    selection::Selection,
};

/// A statement of what must be verified, with its verifying test cases.
///
/// The `verified_by` selection declares verification unidirectionally: test
/// cases carry no matching field and learn of their verifiers through the
/// library's reverse index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirement {
    /// Selection of the test cases claimed to verify this requirement.
    pub verified_by: Selection,

    /// Uninterpreted remainder of the document.
    pub content: Content,
}

impl Requirement {
    /// Computes the fingerprint of this requirement.
    ///
    /// `verifiers` is the resolved set of test case names selected by
    /// `verified_by`. The query text is hashed as authored content; the
    /// `direct_list` is not, so only its resolved effect is visible. A
    /// dangling name added to the list therefore changes nothing until a
    /// test case of that name exists.
    #[must_use]
    pub fn fingerprint(&self, verifiers: &BTreeSet<Name>) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData<'a> {
            content: CanonicalValue,
            query: Option<&'a str>,
            verifiers: Vec<&'a str>,
        }

        let data = FingerprintData {
            content: self.content.canonical(),
            query: self.verified_by.query.as_deref(),
            verifiers: verifiers.iter().map(Name::as_str).collect(),
        };

        let encoded = borsh::to_vec(&data).expect("this should never fail");
        let hash = Sha256::digest(encoded);
        format!("{hash:x}")
    }
}
