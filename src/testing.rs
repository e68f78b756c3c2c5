// In-memory history for unit tests

use crate::error::{ClerkError, Result};
use crate::revision::{CommitModifications, CommitSummary, History, Modification, RevisionId};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Linear history held in memory; one commit per hour from 2024-01-01.
pub struct MemoryHistory {
    commits: Vec<(CommitSummary, Vec<Modification>)>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        MemoryHistory { commits: Vec::new() }
    }

    pub fn commit(mut self, revision: &str, modifications: Vec<Modification>) -> Self {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let authored_at = base + Duration::hours(self.commits.len() as i64);
        self.commits.push((
            CommitSummary {
                revision: RevisionId::new(revision),
                authored_at,
            },
            modifications,
        ));
        self
    }

    fn position(&self, revision: &RevisionId) -> Result<usize> {
        self.commits
            .iter()
            .position(|(summary, _)| &summary.revision == revision)
            .ok_or_else(|| ClerkError::Git(git2::Error::from_str(&format!("unknown revision {revision}"))))
    }
}

impl History for MemoryHistory {
    fn head_revision(&self) -> Result<RevisionId> {
        self.commits
            .last()
            .map(|(summary, _)| summary.revision.clone())
            .ok_or_else(|| ClerkError::Git(git2::Error::from_str("empty history")))
    }

    fn short_id(&self, revision: &str) -> Result<RevisionId> {
        let revision = RevisionId::new(revision);
        self.position(&revision)?;
        Ok(revision)
    }

    fn commit_timestamp(&self, revision: &RevisionId) -> Result<DateTime<Utc>> {
        let index = self.position(revision)?;
        Ok(self.commits[index].0.authored_at)
    }

    fn log(&self) -> Result<Vec<CommitSummary>> {
        Ok(self.commits.iter().map(|(summary, _)| summary.clone()).collect())
    }

    fn modifications_between(
        &self,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<Vec<CommitModifications>> {
        let start = self.position(from)?;
        let end = self.position(to)?;
        Ok(self.commits[start + 1..=end.max(start)]
            .iter()
            .map(|(summary, modifications)| CommitModifications {
                revision: summary.revision.clone(),
                modifications: modifications.clone(),
            })
            .collect())
    }
}
