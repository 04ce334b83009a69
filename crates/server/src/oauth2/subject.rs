//! Pairwise subject identifier resolution.

use crate::error::StorageError;
use crate::storage::ConsentStore;
use std::sync::Arc;
use uuid::Uuid;

/// Maps `(sector identifier, username)` to a stable opaque subject.
///
/// Subjects are random, so two sectors never share a value for the same user.
#[derive(Clone)]
pub struct SubjectResolver {
    store: Arc<dyn ConsentStore>,
}

impl SubjectResolver {
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }

    /// Look up the subject, creating it on first use.
    ///
    /// Concurrent first-use requests converge on whichever subject the store
    /// accepted first.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, sector_id: &str, username: &str) -> Result<Uuid, StorageError> {
        if let Some(subject) = self.store.load_subject(sector_id, username).await? {
            return Ok(subject);
        }

        let subject = self
            .store
            .create_subject(sector_id, username, Uuid::new_v4())
            .await?;

        tracing::debug!(sector_id, username, %subject, "Issued new subject identifier");

        Ok(subject)
    }
}
