use std::collections::BTreeSet;

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use super::{
    content::{CanonicalValue, Content},
    name::Name,
};

/// A single executable verification procedure.
///
/// Tags and priority are the fields queries select on; everything else a
/// test case document carries (instructions, expectations) is opaque
/// [`Content`]. The record's name lives in the owning library's map, not in
/// the record, and never participates in the fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Tag strings used by selection queries.
    pub tags: BTreeSet<String>,

    /// Priority used by selection queries.
    pub priority: i64,

    /// Uninterpreted remainder of the document.
    pub content: Content,
}

impl TestCase {
    /// Computes the fingerprint of this test case.
    ///
    /// `verified_by` is the resolved set of requirement names that verify
    /// this case. Only the names enter the hash, never the requirements'
    /// content: editing a requirement's prose leaves this fingerprint alone,
    /// while adding, removing or renaming a verifying requirement changes
    /// it.
    #[must_use]
    pub fn fingerprint(&self, verified_by: &BTreeSet<Name>) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData<'a> {
            tags: &'a BTreeSet<String>,
            priority: i64,
            content: CanonicalValue,
            verified_by: Vec<&'a str>,
        }

        let data = FingerprintData {
            tags: &self.tags,
            priority: self.priority,
            content: self.content.canonical(),
            verified_by: verified_by.iter().map(Name::as_str).collect(),
        };

        let encoded = borsh::to_vec(&data).expect("this should never fail");
        let hash = Sha256::digest(encoded);
        format!("{hash:x}")
    }
}
