use std::sync::Arc;

use fieldops_catalog::CountryOverrideResolver;
use fieldops_infra::{AttachmentStore, Environment, FulfillmentConfig, FulfillmentStore, OrderFulfillmentService};

/// Everything the HTTP handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub fulfillment: OrderFulfillmentService,
    pub environment: Environment,
}

impl AppServices {
    /// `attachments: None` makes inline attachments a validation error.
    pub fn new(
        store: Arc<dyn FulfillmentStore>,
        attachments: Option<Arc<dyn AttachmentStore>>,
        config: &FulfillmentConfig,
        environment: Environment,
    ) -> Self {
        Self {
            fulfillment: OrderFulfillmentService::new(
                store,
                attachments,
                Arc::new(CountryOverrideResolver),
                config,
            ),
            environment,
        }
    }
}
