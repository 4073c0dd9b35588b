use std::collections::HashSet;

use upg_common::Secret;

/// An API key handed out by [`CredentialRotation`], tagged with its slot so it can be reported as failed.
#[derive(Debug, Clone)]
pub struct Credential {
    pub index: usize,
    pub key: Secret<String>,
}

/// Round-robin over a pool of API keys, skipping keys that have failed.
///
/// Once every key has failed, the failures are forgotten and the rotation starts over.
#[derive(Debug, Clone, Default)]
pub struct CredentialRotation {
    keys: Vec<Secret<String>>,
    next: usize,
    failed: HashSet<usize>,
}

impl CredentialRotation {
    pub fn new(keys: Vec<Secret<String>>) -> Self {
        let keys = keys.into_iter().filter(|k| !k.is_empty()).collect();
        Self { keys, next: 0, failed: HashSet::new() }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The next usable key, or `None` if there are no keys at all (requests go out anonymously).
    pub fn next_credential(&mut self) -> Option<Credential> {
        if self.keys.is_empty() {
            return None;
        }
        for _ in 0..self.keys.len() {
            let index = self.advance();
            if !self.failed.contains(&index) {
                return Some(self.credential(index));
            }
        }
        self.failed.clear();
        let index = self.advance();
        Some(self.credential(index))
    }

    pub fn mark_failed(&mut self, index: usize) {
        if index < self.keys.len() {
            self.failed.insert(index);
        }
    }

    fn advance(&mut self) -> usize {
        let index = self.next;
        self.next = (self.next + 1) % self.keys.len();
        index
    }

    fn credential(&self, index: usize) -> Credential {
        Credential { index, key: self.keys[index].clone() }
    }
}
