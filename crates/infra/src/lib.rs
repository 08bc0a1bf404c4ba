//! Infrastructure layer: storage, configuration, retry and the fulfillment pipeline.

pub mod attachments;
pub mod committer;
pub mod config;
pub mod retry;
pub mod service;
pub mod store;


pub use attachments::{
    AttachmentError, AttachmentStore, DirectoryAttachmentStore, InMemoryAttachmentStore, InlineAttachment,
};
pub use config::{ConfigError, Environment, FulfillmentConfig, Settings};
pub use retry::{BackoffStrategy, RetryPolicy, Retryable, with_retry};
pub use service::{
    CreateOrderRequest, CreatedOrder, DegradedPriceItem, FulfillmentError, OrderFulfillmentService, OrderLineRequest,
    OrderOutcome, Requester,
};
pub use store::{FulfillmentStore, InMemoryFulfillmentStore, PostgresFulfillmentStore, ProductStock, StoreError};
