use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use fieldops_infra::{Environment, FulfillmentError};

const INTERNAL_MESSAGE: &str = "Failed to process the order, please try again";

pub fn fulfillment_error_to_response(err: FulfillmentError, env: Environment) -> axum::response::Response {
    match err {
        FulfillmentError::Validation(ref e) if !e.is_client_input() => {
            tracing::error!(error = %err, "order pipeline invariant violated");
            internal_error(err.to_string(), env)
        }
        FulfillmentError::Validation(_)
        | FulfillmentError::CategoryMismatch(_)
        | FulfillmentError::Allocation(_) => json_error(StatusCode::BAD_REQUEST, err.to_string()),
        FulfillmentError::ClientNotFound(_)
        | FulfillmentError::ProductNotFound(_)
        | FulfillmentError::PriceOptionNotFound(_)
        | FulfillmentError::OrderNotFound(_) => json_error(StatusCode::NOT_FOUND, err.to_string()),
        FulfillmentError::StockConflict(_) => json_error(StatusCode::CONFLICT, err.to_string()),
        FulfillmentError::Attachment(_) | FulfillmentError::Store(_) => {
            tracing::error!(error = %err, "order request failed");
            internal_error(err.to_string(), env)
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

/// Generic 500; the underlying detail is only exposed outside production.
pub fn internal_error(detail: String, env: Environment) -> axum::response::Response {
    let body = if env.is_production() {
        json!({ "success": false, "error": INTERNAL_MESSAGE })
    } else {
        json!({ "success": false, "error": INTERNAL_MESSAGE, "detail": detail })
    };
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
