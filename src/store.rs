//! The credential store contract and its in-memory backend

use tracing::debug;

use crate::error::Result;
use crate::subject::{Subject, SubjectId};

/// Access to stored credentials.
///
/// CRUD operations never fail; "not found" is an ordinary result. Only
/// [`Store::persist`] touches durable state.
pub trait Store {
    /// Identities of all subjects, with secrets redacted.
    ///
    /// Order is stable across non-mutating calls.
    fn list(&self) -> Vec<SubjectId>;

    /// The full subject, including secrets, matching `id` exactly.
    fn load(&self, id: &SubjectId) -> Option<Subject>;

    /// Insert `subject`, or replace the subject with the same identity in place.
    fn store(&mut self, subject: Subject);

    /// Remove the subject matching `id`. Returns false if there was none.
    fn delete(&mut self, id: &SubjectId) -> bool;

    /// Make the current contents durable.
    fn persist(&mut self) -> Result<()>;
}

/// Ordered subjects held purely in memory.
///
/// Also serves as the record layer underneath [`crate::FileStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    subjects: Vec<Subject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_subjects(subjects: Vec<Subject>) -> Self {
        let mut store = Self::new();
        for subject in subjects {
            store.store(subject);
        }
        store
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    fn position(&self, id: &SubjectId) -> Option<usize> {
        self.subjects.iter().position(|s| s.id == *id)
    }
}

impl Store for MemoryStore {
    fn list(&self) -> Vec<SubjectId> {
        self.subjects.iter().map(|s| s.id.clone()).collect()
    }

    fn load(&self, id: &SubjectId) -> Option<Subject> {
        self.position(id).map(|i| self.subjects[i].clone())
    }

    fn store(&mut self, subject: Subject) {
        match self.position(&subject.id) {
            Some(i) => self.subjects[i] = subject,
            None => self.subjects.push(subject),
        }
    }

    fn delete(&mut self, id: &SubjectId) -> bool {
        match self.position(id) {
            Some(i) => {
                self.subjects.remove(i);
                true
            }
            None => false,
        }
    }

    fn persist(&mut self) -> Result<()> {
        debug!(subjects = self.subjects.len(), "in-memory store has nothing to persist");
        Ok(())
    }
}
