use crate::{access::RepositoryIdentity, challenge::AuthFailure};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredErrors {
    entries: Vec<(String, AuthFailure)>,
}

impl DeferredErrors {
    pub fn add(&mut self, identity: &RepositoryIdentity, failure: AuthFailure) {
        let key = identity.key();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = failure,
            None => self.entries.push((key, failure)),
        }
    }

    pub fn get(&self, identity: &RepositoryIdentity) -> Option<&AuthFailure> {
        self.get_key(&identity.key())
    }

    pub fn get_key(&self, key: &str) -> Option<&AuthFailure> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, failure)| failure)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AuthFailure)> {
        self.entries
            .iter()
            .map(|(key, failure)| (key.as_str(), failure))
    }

    /// Entries survive only when a push to the same repository succeeded; otherwise the
    /// first entry in insertion order becomes the pass's failure.
    pub fn reconcile(self, pushes: &PushChecks) -> Result<Self, AuthFailure> {
        for (key, failure) in &self.entries {
            if pushes.is_empty() || !pushes.contains_key(key) {
                return Err(failure.clone());
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushChecks(BTreeSet<String>);

impl PushChecks {
    pub fn record(&mut self, identity: &RepositoryIdentity) {
        self.0.insert(identity.key());
    }

    pub fn contains(&self, identity: &RepositoryIdentity) -> bool {
        self.contains_key(&identity.key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
