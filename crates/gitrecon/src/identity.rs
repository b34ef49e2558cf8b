use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// -------------------------------------------------------------------------------------------------
// Identity
// -------------------------------------------------------------------------------------------------
/// An `(email, name)` pair taken from the author or committer of a commit.
///
/// Two identities are equal only if both fields match exactly; no case folding or other
/// normalization is applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
}

impl Identity {
    pub fn new<E: Into<String>, N: Into<String>>(email: E, name: N) -> Self {
        Identity {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Build an identity from a `git2` signature, decoding non-UTF-8 bytes lossily.
    pub fn from_signature(sig: &git2::Signature<'_>) -> Self {
        Identity {
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// CommitMetadata
// -------------------------------------------------------------------------------------------------
/// The deduplicated set of identities seen in the commits of one repository.
///
/// An ordered set is used so that iteration, and therefore output, is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitMetadata(BTreeSet<Identity>);

impl CommitMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity, returning `true` if it was not already present.
    pub fn insert(&mut self, identity: Identity) -> bool {
        self.0.insert(identity)
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, other: CommitMetadata) {
        if self.0.is_empty() {
            self.0 = other.0;
        } else {
            self.0.extend(other.0);
        }
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.0.iter()
    }

    /// The distinct email addresses in this set, in sorted order.
    pub fn emails(&self) -> Vec<String> {
        let emails: BTreeSet<&str> = self.0.iter().map(|i| i.email.as_str()).collect();
        emails.into_iter().map(str::to_owned).collect()
    }

    /// Group the names seen for each email address.
    pub fn names_by_email(&self) -> BTreeMap<String, Vec<String>> {
        let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for identity in &self.0 {
            // The set is ordered by (email, name), so names arrive sorted and distinct.
            result
                .entry(identity.email.clone())
                .or_default()
                .push(identity.name.clone());
        }
        result
    }
}

impl FromIterator<Identity> for CommitMetadata {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        CommitMetadata(iter.into_iter().collect())
    }
}

impl Extend<Identity> for CommitMetadata {
    fn extend<I: IntoIterator<Item = Identity>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for CommitMetadata {
    type Item = Identity;
    type IntoIter = std::collections::btree_set::IntoIter<Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommitMetadata {
    type Item = &'a Identity;
    type IntoIter = std::collections::btree_set::Iter<'a, Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Serialize a `CommitMetadata` as a map from email address to the list of names seen with it.
pub fn serialize_names_by_email<S: serde::Serializer>(
    metadata: &CommitMetadata,
    s: S,
) -> Result<S::Ok, S::Error> {
    metadata.names_by_email().serialize(s)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn identity_strategy() -> impl Strategy<Value = Identity> {
        ("[a-c]{1,2}@x\\.com", "[A-C][a-c]{0,2}").prop_map(|(e, n)| Identity::new(e, n))
    }

    fn metadata_strategy() -> impl Strategy<Value = CommitMetadata> {
        prop::collection::vec(identity_strategy(), 0..24).prop_map(CommitMetadata::from_iter)
    }

    proptest! {
        #[test]
        fn merge_with_self_is_unchanged(md in metadata_strategy()) {
            let mut merged = md.clone();
            merged.merge(md.clone());
            prop_assert_eq!(merged, md);
        }

        #[test]
        fn merge_is_commutative(a in metadata_strategy(), b in metadata_strategy()) {
            let mut ab = a.clone();
            ab.merge(b.clone());
            let mut ba = b;
            ba.merge(a);
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn no_duplicate_identities(ids in prop::collection::vec(identity_strategy(), 0..48)) {
            let md: CommitMetadata = ids.iter().cloned().collect();
            let distinct: BTreeSet<Identity> = ids.into_iter().collect();
            prop_assert_eq!(md.len(), distinct.len());
        }
    }

    #[test]
    fn identity_equality_is_exact() {
        assert_ne!(Identity::new("a@x.com", "Alice"), Identity::new("A@x.com", "Alice"));
        assert_ne!(Identity::new("a@x.com", "Alice"), Identity::new("a@x.com", "alice"));
    }

    #[test]
    fn insert_reports_novelty() {
        let mut md = CommitMetadata::new();
        assert!(md.insert(Identity::new("a@x.com", "Alice")));
        assert!(!md.insert(Identity::new("a@x.com", "Alice")));
        assert_eq!(md.len(), 1);
    }

    #[test]
    fn names_by_email_groups_names() {
        let md: CommitMetadata = [
            Identity::new("a@x.com", "Alice"),
            Identity::new("a@x.com", "A. Liddell"),
            Identity::new("b@x.com", "Bob"),
            Identity::new("a@x.com", "Alice"),
        ]
        .into_iter()
        .collect();

        let grouped = md.names_by_email();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["a@x.com"], vec!["A. Liddell".to_string(), "Alice".to_string()]);
        assert_eq!(grouped["b@x.com"], vec!["Bob".to_string()]);
        assert_eq!(md.emails(), vec!["a@x.com".to_string(), "b@x.com".to_string()]);
    }
}
