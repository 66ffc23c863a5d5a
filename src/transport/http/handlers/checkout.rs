use crate::transport::http::types::{
    json_400, AppState, CheckoutBody, CheckoutInfo, CheckoutReply, ErrorResponse,
};
use crate::app::CheckoutResponse;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

#[utoipa::path(
    get,
    path = "/checkout",
    responses(
        (status = 200, description = "Merchant label and icon for payment-request wallets", body = CheckoutInfo)
    )
)]
pub async fn checkout_info_handler(State(state): State<AppState>) -> Json<CheckoutInfo> {
    Json(CheckoutInfo {
        label: state.label.clone(),
        icon: state.icon.clone(),
    })
}

#[utoipa::path(
    post,
    path = "/checkout",
    request_body = CheckoutBody,
    responses(
        (status = 200, description = "Base64 purchase transaction plus a summary message", body = CheckoutResponse),
        (status = 400, description = "Malformed body or account", body = ErrorResponse),
        (status = 402, description = "Insufficient funds or no payment token account", body = ErrorResponse),
        (status = 409, description = "Buyer already owns a pass", body = ErrorResponse),
        (status = 422, description = "Signature order violation, wrong or expired transaction", body = ErrorResponse),
        (status = 502, description = "Ledger RPC failure", body = ErrorResponse),
        (status = 500, description = "Service misconfigured", body = ErrorResponse)
    )
)]
pub async fn checkout_handler(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> CheckoutReply {
    let Json(body) = payload.map_err(json_400)?;
    let request = body.into_request()?;
    let response = state.checkout.handle(request).await?;
    Ok(Json(response))
}
