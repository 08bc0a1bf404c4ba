use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use fieldops_core::OrderId;
use fieldops_infra::{FulfillmentError, OrderOutcome};

use crate::app::dto;
use crate::app::errors::{fulfillment_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::context::RequesterContext;

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequesterContext>,
    body: Result<Json<dto::CreateOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let request = match body.into_service_request(ctx.requester()) {
        Ok(r) => r,
        Err(e) => return fulfillment_error_to_response(FulfillmentError::Validation(e), services.environment),
    };

    match services.fulfillment.create_order(request).await {
        Ok(OrderOutcome::Created(created)) => (
            StatusCode::CREATED,
            Json(dto::CreatedOrderResponse::from(*created)),
        )
            .into_response(),
        Ok(OrderOutcome::BalanceBlocked(block)) => {
            (StatusCode::OK, Json(dto::BalanceBlockedResponse::from(block))).into_response()
        }
        Err(e) => fulfillment_error_to_response(e, services.environment),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid order id"),
    };

    match services.fulfillment.get_order(id).await {
        Ok(order) => Json(dto::OrderEnvelope {
            success: true,
            order: order.into(),
        })
        .into_response(),
        Err(e) => fulfillment_error_to_response(e, services.environment),
    }
}
