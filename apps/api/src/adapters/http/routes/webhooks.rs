use secrecy::ExposeSecret;

use super::common::*;
use crate::{
    infra::webhook_signature::{self, SIGNATURE_HEADER},
    use_cases::billing::WebhookOutcome,
};

#[derive(Serialize)]
struct WebhookResponse {
    outcome: WebhookOutcome,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/payments", post(payment_webhook))
}

/// Gateway notifications. The raw body is verified before it is parsed;
/// any non-2xx answer makes the gateway retry later.
async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook without signature header");
            AppError::InvalidSignature
        })?;

    webhook_signature::verify(
        &body,
        signature,
        app_state.config.webhook_secret.expose_secret(),
        chrono::Utc::now().timestamp(),
    )?;

    let outcome = app_state.billing_use_cases.process_webhook(&body).await?;
    Ok(Json(WebhookResponse { outcome }))
}
