//! hiveindex-core — foundation for the resumable Hive → OpenSearch ingestion pipeline.
//!
//! # Architecture
//!
//! ```text
//! IngestionLoop (hiveindex-stream)
//!     ├── BlockSource        (window fetch, endpoint failover)
//!     ├── router::route      (partition ops by kind)
//!     ├── HandlerSet         (comment / vote / custom_json / account_update)
//!     │       └── identity   (content-addressed document ids)
//!     ├── DocumentStore      (existence reads + one bulk write per cycle)
//!     └── CheckpointManager  (advance only after a successful commit)
//! ```

pub mod checkpoint;
pub mod commit;
pub mod content;
pub mod cursor;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod indexer;
pub mod mutation;
pub mod router;
pub mod store;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore};
pub use commit::BulkCommitter;
pub use cursor::Cursor;
pub use error::IndexerError;
pub use handlers::{ContentSource, CustomJsonInterpreter, HandlerSet, NoopInterpreter};
pub use identity::{identity_of, DocumentId};
pub use indexer::{CommunityConfig, IndexNames, IndexerConfig, IndexerState};
pub use mutation::{DocumentMutation, DocumentTarget, MutationBody, UpdateScript};
pub use router::{route, RoutedOperations};
pub use store::{BulkFailure, BulkOutcome, DocumentStore};
pub use types::{AccountUpdateOp, Block, CommentOp, CustomJsonOp, Operation, VoteOp};
