//! Transactional commit under a hard timeout, wrapped in retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use fieldops_sales::{CommitReceipt, OrderDraft};

use crate::retry::{RetryPolicy, with_retry};
use crate::store::{FulfillmentStore, StoreError};

pub struct TransactionalCommitter {
    store: Arc<dyn FulfillmentStore>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl TransactionalCommitter {
    pub fn new(store: Arc<dyn FulfillmentStore>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self { store, retry, timeout }
    }

    /// Commit the draft. Each attempt is bounded by the timeout; an elapsed
    /// attempt drops its transaction (rolling it back) and counts as
    /// transient.
    pub async fn commit(&self, draft: &OrderDraft) -> Result<CommitReceipt, StoreError> {
        with_retry(&self.retry, "commit_order", |attempt| async move {
            debug!(attempt, client_id = %draft.client_id, "committing order");
            match tokio::time::timeout(self.timeout, self.store.commit_order(draft)).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::TransactionTimeout(self.timeout)),
            }
        })
        .await
    }
}
