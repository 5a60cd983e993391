//! Operation router — partitions one window's operations by kind.

use crate::types::{AccountUpdateOp, Block, CommentOp, CustomJsonOp, Operation, VoteOp};

/// One window's operations, bucketed by kind in chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedOperations {
    pub comments: Vec<CommentOp>,
    pub votes: Vec<VoteOp>,
    pub custom_jsons: Vec<CustomJsonOp>,
    pub account_updates: Vec<AccountUpdateOp>,
}

impl RoutedOperations {
    /// Total number of routed (indexable) operations.
    pub fn len(&self) -> usize {
        self.comments.len() + self.votes.len() + self.custom_jsons.len() + self.account_updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flatten `blocks` and split their operations into per-kind buckets.
///
/// Relative order inside each bucket is preserved; kinds outside the four
/// indexed ones are dropped.
pub fn route(blocks: &[Block]) -> RoutedOperations {
    let mut routed = RoutedOperations::default();
    for op in blocks.iter().flat_map(|b| b.operations.iter()) {
        match op {
            Operation::Comment(c) => routed.comments.push(c.clone()),
            Operation::Vote(v) => routed.votes.push(v.clone()),
            Operation::CustomJson(j) => routed.custom_jsons.push(j.clone()),
            Operation::AccountUpdate(a) => routed.account_updates.push(a.clone()),
            Operation::Other { .. } => {}
        }
    }
    routed
}
