use crate::app::{parse_buyer, CheckoutRequest, CheckoutResponse, CheckoutService};
use crate::domain::signing::Protocol;
use crate::error::{CheckoutError, CheckoutResult};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub label: String,
    pub icon: String,
    pub rpc_url: String,
}

/// `GET /checkout`: what a payment-request wallet shows before the buyer connects.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CheckoutInfo {
    pub label: String,
    pub icon: String,
}

/// `POST /checkout` body.
///
/// - `{ account }`: build a transaction presigned by the service (payment-request wallets).
/// - `{ account, protocol: "direct" }`: build an unsigned transaction for the web client.
/// - `{ account, signedTransaction }`: countersign a buyer-signed transaction.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub account: Option<String>,
    /// Base64 wire transaction carrying the buyer's signature.
    #[serde(default)]
    pub signed_transaction: Option<String>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
}

impl CheckoutBody {
    pub fn into_request(self) -> CheckoutResult<CheckoutRequest> {
        let account = self
            .account
            .ok_or_else(|| CheckoutError::Validation("No account provided".to_string()))?;
        let buyer = parse_buyer(&account)?;

        match (self.signed_transaction, self.protocol) {
            (Some(_), Some(Protocol::PaymentRequest)) => Err(CheckoutError::Validation(
                "signedTransaction is only accepted for the direct protocol".to_string(),
            )),
            (Some(signed_transaction), _) => {
                if signed_transaction.trim().is_empty() {
                    return Err(CheckoutError::Validation(
                        "No signedTransaction provided".to_string(),
                    ));
                }
                Ok(CheckoutRequest::Submit {
                    buyer,
                    signed_transaction,
                })
            }
            (None, protocol) => Ok(CheckoutRequest::Create {
                buyer,
                protocol: protocol.unwrap_or(Protocol::PaymentRequest),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable kind, e.g. `insufficient_funds`.
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub authority: String,
    pub rpc_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn status_for(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::InsufficientFunds { .. } | CheckoutError::NoPaymentAccount { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        CheckoutError::AlreadyPurchased { .. } => StatusCode::CONFLICT,
        CheckoutError::SignatureOrder(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::ChainRpc(_) | CheckoutError::ChainRejected(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn code_for(err: &CheckoutError) -> &'static str {
    match err {
        CheckoutError::Validation(_) => "validation",
        CheckoutError::InsufficientFunds { .. } => "insufficient_funds",
        CheckoutError::NoPaymentAccount { .. } => "no_payment_account",
        CheckoutError::AlreadyPurchased { .. } => "already_purchased",
        CheckoutError::SignatureOrder(_) => "signature_order",
        CheckoutError::ChainRpc(_) => "chain_rpc",
        CheckoutError::ChainRejected(_) => "chain_rejected",
        CheckoutError::Configuration(_) => "configuration",
    }
}

/// HTTP-facing wrapper so handlers can return `Result<_, ApiError>` and use `?`.
#[derive(Debug)]
pub struct ApiError(pub CheckoutError);

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if self.0.is_client_error() {
            tracing::info!(error = %self.0, %status, "checkout rejected");
        } else {
            tracing::error!(error = %self.0, %status, "checkout failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code_for(&self.0).to_string(),
            }),
        )
            .into_response()
    }
}

pub fn json_400(err: JsonRejection) -> ApiError {
    ApiError(CheckoutError::Validation(format!("Invalid JSON body: {}", err)))
}

pub type CheckoutReply = Result<Json<CheckoutResponse>, ApiError>;
