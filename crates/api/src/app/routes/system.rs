use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::context::RequesterContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequesterContext>) -> impl IntoResponse {
    let requester = ctx.requester();
    Json(serde_json::json!({
        "userId": requester.user_id,
        "regionId": requester.region_id,
        "countryId": requester.country_id,
    }))
}
