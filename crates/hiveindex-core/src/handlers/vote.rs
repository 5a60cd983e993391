//! Vote handler.
//!
//! Votes are applied only to content that is already indexed: one batched
//! existence query resolves every target, and votes for unknown content are
//! dropped. Each surviving vote appends the voter to `upvotes` or
//! `downvotes` (a repeated vote is a no-op) and refreshes the voter's
//! last-active timestamp.

use std::sync::Arc;

use async_trait::async_trait;

use super::KindHandler;
use crate::error::IndexerError;
use crate::identity::{identity_of, DocumentId};
use crate::indexer::IndexNames;
use crate::mutation::{DocumentMutation, DocumentTarget};
use crate::store::DocumentStore;
use crate::types::VoteOp;

pub struct VoteHandler {
    store: Arc<dyn DocumentStore>,
    indices: IndexNames,
}

impl VoteHandler {
    pub fn new(store: Arc<dyn DocumentStore>, indices: IndexNames) -> Self {
        Self { store, indices }
    }
}

/// Set field a vote of `weight` lands in.
pub fn vote_field(weight: i64) -> &'static str {
    if weight > 0 {
        "upvotes"
    } else {
        "downvotes"
    }
}

#[async_trait]
impl KindHandler<VoteOp> for VoteHandler {
    async fn mutations(&self, votes: &[VoteOp]) -> Result<Vec<DocumentMutation>, IndexerError> {
        if votes.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<DocumentId> = votes.iter().map(|v| identity_of(&v.author, &v.permlink)).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        let located = self.store.locate(&self.indices.content_alias, &unique).await?;

        let mut out = Vec::with_capacity(votes.len() * 2);
        let mut dropped = 0usize;
        for (vote, id) in votes.iter().zip(&ids) {
            let Some(partition) = located.get(id) else {
                dropped += 1;
                continue;
            };
            out.push(DocumentMutation::append_unique(
                DocumentTarget::new(partition, id.as_str()),
                vote_field(vote.weight),
                &vote.voter,
            ));
            out.push(DocumentMutation::last_active(&self.indices.accounts, &vote.voter, &vote.timestamp));
        }

        if dropped > 0 {
            tracing::debug!(dropped, total = votes.len(), "votes for unindexed content dropped");
        }
        Ok(out)
    }

    fn kind(&self) -> &'static str {
        "vote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::StubStore;
    use crate::mutation::{MutationBody, UpdateScript};
    use std::sync::atomic::Ordering;

    fn vote(voter: &str, author: &str, permlink: &str, weight: i64) -> VoteOp {
        VoteOp {
            voter: voter.into(),
            author: author.into(),
            permlink: permlink.into(),
            weight,
            timestamp: "2024-01-01T00:00:03".into(),
        }
    }

    #[tokio::test]
    async fn vote_for_missing_post_is_dropped_entirely() {
        let store = Arc::new(StubStore::with([identity_of("alice", "post1")], "hive-post-data-0-2024"));
        let h = VoteHandler::new(store, IndexNames::default());
        let out = h.mutations(&[vote("carol", "bob", "missing-post", 100)]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn vote_targets_located_partition() {
        let id = identity_of("alice", "post1");
        let store = Arc::new(StubStore::with([id.clone()], "hive-post-data-0-2024"));
        let h = VoteHandler::new(store.clone(), IndexNames::default());

        let out = h
            .mutations(&[vote("bob", "alice", "post1", 5000), vote("eve", "alice", "post1", -100)])
            .await
            .unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(store.locate_calls.load(Ordering::Relaxed), 1);
        assert_eq!(out[0].target, DocumentTarget::new("hive-post-data-0-2024", id.as_str()));
        assert_eq!(
            out[0].body,
            MutationBody::Script {
                script: UpdateScript::AppendUnique { field: "upvotes".into(), value: "bob".into() },
                upsert: None,
            }
        );
        assert_eq!(out[1].target, DocumentTarget::new("hive-accounts", "bob"));
        match &out[2].body {
            MutationBody::Script { script: UpdateScript::AppendUnique { field, .. }, .. } => {
                assert_eq!(field, "downvotes")
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn zero_weight_is_downvote_field() {
        assert_eq!(vote_field(0), "downvotes");
        assert_eq!(vote_field(1), "upvotes");
    }
}
