use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use super::ApiError;
use crate::context::AppContext;
use crate::gateway::webhook::{parse_event, ParsedWebhook, SIGNATURE_HEADER};
use crate::services::WebhookOutcome;

/// Gateway callback. The raw body is verified before it is parsed.
pub async fn payment_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    ctx.webhooks.verify(signature, &body, now)?;

    let outcome = match parse_event(&body, now)? {
        ParsedWebhook::Payment(event) => ctx.orders.handle_payment_event(event).await?,
        ParsedWebhook::Ignored { id, kind } => {
            tracing::debug!(event_id = %id, kind = %kind, "webhook event ignored");
            WebhookOutcome::Ignored
        }
    };
    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
