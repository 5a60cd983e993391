//! Comment handler.
//!
//! Per comment:
//!
//! ```text
//! reply ──► trigger phrase + moderator? ──► one tag update on the referenced post
//!
//! post ──► exists in store? ──no──► build from the streamed payload
//!                           └─yes─► refetch canonical content ──ok──► build
//!                                                             └─err─► retry (bounded), then drop
//! ```

use std::slice;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Map, Value};

use super::KindHandler;
use crate::content::{hashtags, render_body, PostMetadata};
use crate::error::IndexerError;
use crate::identity::{identity_of, DocumentId};
use crate::indexer::{CommunityConfig, IndexNames};
use crate::mutation::{DocumentMutation, DocumentTarget};
use crate::store::DocumentStore;
use crate::types::CommentOp;

/// Source of canonical, fully-resolved content from the chain.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the current state of `author/permlink`, with `timestamp` set to
    /// its creation time.
    async fn fetch_content(&self, author: &str, permlink: &str) -> Result<CommentOp, IndexerError>;
}

pub struct CommentHandler {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn ContentSource>,
    indices: IndexNames,
    community: CommunityConfig,
    retries: u32,
    retry_delay: Duration,
}

impl CommentHandler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn ContentSource>,
        indices: IndexNames,
        community: CommunityConfig,
    ) -> Self {
        Self {
            store,
            source,
            indices,
            community,
            retries: 10,
            retry_delay: Duration::from_millis(750),
        }
    }

    /// Override the refetch retry budget.
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    async fn process_one(&self, comment: &CommentOp) -> Result<Vec<DocumentMutation>, IndexerError> {
        if !comment.is_top_level() {
            return Ok(self.reply_mutations(comment));
        }

        let id = identity_of(&comment.author, &comment.permlink);
        let mut attempt = 0u32;
        let resolved = loop {
            attempt += 1;
            match self.resolve(comment, &id, attempt).await {
                Ok(resolved) => break resolved,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if attempt > self.retries => {
                    tracing::error!(
                        author = %comment.author,
                        permlink = %comment.permlink,
                        attempts = attempt,
                        error = %e,
                        "dropping comment after repeated refetch failures"
                    );
                    return Ok(vec![]);
                }
                Err(e) => {
                    tracing::warn!(
                        author = %comment.author,
                        permlink = %comment.permlink,
                        attempt,
                        error = %e,
                        "refetch failed; retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        };

        Ok(self.content_mutations(&resolved, &id))
    }

    /// The payload to index: the streamed one for new content, the chain's
    /// canonical copy for content that is already indexed.
    async fn resolve(&self, comment: &CommentOp, id: &DocumentId, attempt: u32) -> Result<CommentOp, IndexerError> {
        let found = self
            .store
            .locate(&self.indices.content_alias, slice::from_ref(id))
            .await?;
        if found.is_empty() {
            return Ok(comment.clone());
        }

        tracing::debug!(author = %comment.author, permlink = %comment.permlink, "already indexed; refetching");
        self.source
            .fetch_content(&comment.author, &comment.permlink)
            .await
            .map_err(|e| IndexerError::ContentResolution {
                author: comment.author.clone(),
                permlink: comment.permlink.clone(),
                attempts: attempt,
                reason: e.to_string(),
            })
    }

    fn content_mutations(&self, comment: &CommentOp, id: &DocumentId) -> Vec<DocumentMutation> {
        let mut metadata = PostMetadata::parse(&comment.json_metadata);
        let rendered = render_body(&comment.body);
        metadata.merge_images(&rendered.images);

        let community_tags = self
            .community
            .claims(&metadata.tags, &comment.parent_permlink)
            .then(|| hashtags(&rendered.text));

        let mut doc = Map::new();
        doc.insert("author".into(), json!(comment.author));
        doc.insert("permlink".into(), json!(comment.permlink));
        doc.insert("text_title".into(), json!(comment.title));
        doc.insert("text_body".into(), json!(rendered.text));
        doc.insert("parent_permlink".into(), json!(comment.parent_permlink));
        doc.insert("tags".into(), json!(metadata.tags));
        doc.insert("image".into(), json!(metadata.image));
        doc.insert("timestamp".into(), json!(comment.timestamp));
        doc.insert(self.community.tag_field.clone(), json!(community_tags));

        let target = DocumentTarget::new(self.indices.content_partition(&comment.timestamp), id.as_str());
        vec![
            DocumentMutation::upsert(target.clone(), Value::Object(doc)),
            DocumentMutation::reset_jobs(target),
            DocumentMutation::last_active(&self.indices.accounts, &comment.author, &comment.timestamp),
        ]
    }

    /// Replies are never indexed; a moderator reply carrying the trigger
    /// phrase updates the community tags instead.
    fn reply_mutations(&self, reply: &CommentOp) -> Vec<DocumentMutation> {
        if !reply.body.contains(&self.community.trigger_phrase) {
            return vec![];
        }
        if !self.community.is_moderator(&reply.author) {
            tracing::info!(author = %reply.author, permlink = %reply.permlink, "tag update from non-moderator ignored");
            return vec![];
        }

        let tags = hashtags(&reply.body);
        let id = identity_of(&reply.author, &reply.permlink);
        let mut doc = Map::new();
        doc.insert(self.community.tag_field.clone(), json!(tags));
        vec![DocumentMutation::upsert(
            DocumentTarget::new(&self.community.reply_tag_index, id.as_str()),
            Value::Object(doc),
        )]
    }
}

#[async_trait]
impl KindHandler<CommentOp> for CommentHandler {
    async fn mutations(&self, ops: &[CommentOp]) -> Result<Vec<DocumentMutation>, IndexerError> {
        let results = join_all(ops.iter().map(|c| self.process_one(c))).await;
        let mut out = Vec::new();
        for result in results {
            out.extend(result?);
        }
        Ok(out)
    }

    fn kind(&self) -> &'static str {
        "comment"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{StubSource, StubStore};
    use crate::mutation::{MutationBody, UpdateScript};
    use std::sync::atomic::Ordering;

    fn comment(author: &str, permlink: &str, parent_author: &str, body: &str) -> CommentOp {
        CommentOp {
            parent_author: parent_author.into(),
            parent_permlink: "photography".into(),
            author: author.into(),
            permlink: permlink.into(),
            title: "A title".into(),
            body: body.into(),
            json_metadata: r#"{"tags": ["photography"], "image": []}"#.into(),
            timestamp: "2024-05-04T10:00:00".into(),
        }
    }

    fn handler(store: StubStore, source: StubSource, retries: u32) -> CommentHandler {
        CommentHandler::new(
            Arc::new(store),
            Arc::new(source),
            IndexNames::default(),
            CommunityConfig::default(),
        )
        .with_retries(retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn new_post_emits_three_mutations() {
        let h = handler(StubStore::default(), StubSource::failing_times(None, 0), 10);
        let post = comment("alice", "post1", "", "Hello ![pic](https://i.example/p.png)");
        let out = h.mutations(&[post]).await.unwrap();
        assert_eq!(out.len(), 3);

        let id = identity_of("alice", "post1");
        assert_eq!(out[0].target, DocumentTarget::new("hive-post-data-4-2024", id.as_str()));
        match &out[0].body {
            MutationBody::Merge { doc, upsert } => {
                assert_eq!(doc, upsert);
                assert_eq!(doc["author"], "alice");
                assert_eq!(doc["text_body"], "Hello");
                assert_eq!(doc["image"], json!(["https://i.example/p.png"]));
                assert_eq!(doc["stockimage_tags"], Value::Null);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert!(matches!(
            out[1].body,
            MutationBody::Script { script: UpdateScript::ResetJobs, .. }
        ));
        assert_eq!(out[2].target, DocumentTarget::new("hive-accounts", "alice"));
    }

    #[tokio::test]
    async fn community_post_gets_tag_string() {
        let h = handler(StubStore::default(), StubSource::failing_times(None, 0), 0);
        let mut post = comment("alice", "tree", "", "Old oak #tree #nature\n\n#forest");
        post.parent_permlink = "hive-118554".into();
        let out = h.mutations(&[post]).await.unwrap();
        match &out[0].body {
            MutationBody::Merge { doc, .. } => assert_eq!(doc["stockimage_tags"], "tree nature forest"),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn existing_post_uses_refetched_payload() {
        let id = identity_of("alice", "post1");
        let mut canonical = comment("alice", "post1", "", "edited body");
        canonical.title = "Edited".into();
        canonical.timestamp = "2023-11-01T09:00:00".into();
        let source = StubSource::returning(canonical);
        let h = CommentHandler::new(
            Arc::new(StubStore::with([id.clone()], "hive-post-data-10-2023")),
            Arc::new(source),
            IndexNames::default(),
            CommunityConfig::default(),
        );

        let out = h.mutations(&[comment("alice", "post1", "", "streamed body")]).await.unwrap();
        assert_eq!(out[0].target.index, "hive-post-data-10-2023");
        match &out[0].body {
            MutationBody::Merge { doc, .. } => {
                assert_eq!(doc["text_title"], "Edited");
                assert_eq!(doc["text_body"], "edited body");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn refetch_retries_then_succeeds() {
        let id = identity_of("alice", "post1");
        let source = Arc::new(StubSource::failing_times(Some(comment("alice", "post1", "", "x")), 3));
        let h = CommentHandler::new(
            Arc::new(StubStore::with([id], "p")),
            source.clone(),
            IndexNames::default(),
            CommunityConfig::default(),
        )
        .with_retries(10, Duration::ZERO);

        let out = h.mutations(&[comment("alice", "post1", "", "x")]).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(source.calls.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn refetch_exhaustion_drops_comment() {
        let id = identity_of("alice", "post1");
        let source = Arc::new(StubSource::failing_times(None, 0));
        let h = CommentHandler::new(
            Arc::new(StubStore::with([id], "p")),
            source.clone(),
            IndexNames::default(),
            CommunityConfig::default(),
        )
        .with_retries(10, Duration::ZERO);

        let out = h.mutations(&[comment("alice", "post1", "", "x")]).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(source.calls.load(Ordering::Relaxed), 11);
    }

    #[tokio::test]
    async fn plain_reply_is_not_indexed() {
        let h = handler(StubStore::default(), StubSource::failing_times(None, 0), 0);
        let out = h.mutations(&[comment("bob", "re-post1", "alice", "nice shot")]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn trigger_reply_from_outsider_is_ignored() {
        let h = handler(StubStore::default(), StubSource::failing_times(None, 0), 0);
        let reply = comment("mallory", "re-1", "alice", "!update-stock-image-tags #spam");
        assert!(h.mutations(&[reply]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trigger_reply_from_moderator_updates_tags() {
        let h = handler(StubStore::default(), StubSource::failing_times(None, 0), 0);
        let reply = comment("crosheille", "re-1", "alice", "!update-stock-image-tags #wool #yarn");
        let out = h.mutations(&[reply]).await.unwrap();
        assert_eq!(out.len(), 1);
        let id = identity_of("crosheille", "re-1");
        assert_eq!(out[0].target, DocumentTarget::new("hive-post-data", id.as_str()));
        match &out[0].body {
            MutationBody::Merge { doc, .. } => assert_eq!(doc, &json!({"stockimage_tags": "wool yarn"})),
            other => panic!("unexpected body {other:?}"),
        }
    }
}
