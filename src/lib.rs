use aws_lambda_events::apigw::{ApiGatewayV2httpRequest, ApiGatewayV2httpResponse};
use aws_lambda_events::encodings::Body;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use lambda_runtime::{Error, LambdaEvent};
use serde_json::{json, Value};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::amplitude::client::Deliver;
use crate::amplitude::compose::{self, Composition, SkipReason};
use crate::branch::Payload;
use crate::config::Config;
use crate::error::HandlerError;

pub mod amplitude;
pub mod auth;
pub mod branch;
pub mod config;
pub mod error;
pub mod events;

pub fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();
}

/// Result of a successfully handled webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered { insert_id: String },
    Skipped(SkipReason),
}

impl Outcome {
    pub fn to_body(&self) -> Value {
        match self {
            Outcome::Delivered { insert_id } => json!({
                "ok": true,
                "result": "delivered",
                "insert_id": insert_id,
            }),
            Outcome::Skipped(reason) => json!({
                "ok": true,
                "result": "skipped",
                "reason": reason.to_string(),
            }),
        }
    }
}

// lambda handler
pub async fn handler<D>(
    delivery: &D,
    config: &Config,
    evt: LambdaEvent<events::Webhook>,
) -> Result<ApiGatewayV2httpResponse, Error>
where
    D: Deliver + ?Sized,
{
    info!("Handling lambda invocation");
    debug!("Request id: {}", evt.context.request_id);

    match evt.payload {
        events::Webhook::Http(request) => {
            let result = handle_http(delivery, config, &request).await;
            if let Err(error) = &result {
                info!(
                    status = error.status_code(),
                    retryable = error.is_retryable(),
                    "Rejecting webhook: {}",
                    error
                );
            }
            Ok(respond(result))
        }
        events::Webhook::Direct(body) => {
            let result = match events::direct_payload(body) {
                Ok(payload) => process(delivery, payload).await,
                Err(error) => Err(error),
            };
            match result {
                // no HTTP caller to answer; lambda retries async invokes on error
                Err(error) if error.is_retryable() => Err(error.into()),
                Err(error) => {
                    info!(status = error.status_code(), "Dropping invocation: {}", error);
                    Ok(respond(Err(error)))
                }
                Ok(outcome) => Ok(respond(Ok(outcome))),
            }
        }
    }
}

async fn handle_http<D>(
    delivery: &D,
    config: &Config,
    request: &ApiGatewayV2httpRequest,
) -> Result<Outcome, HandlerError>
where
    D: Deliver + ?Sized,
{
    if request.request_context.http.method != Method::POST {
        return Err(HandlerError::MethodNotAllowed);
    }
    auth::authorize(&request.headers, &config.auth_token)?;
    let payload = events::decode_body(request)?;
    process(delivery, payload).await
}

/// Composes the batch for one payload and hands it to `delivery`.
pub async fn process<D>(delivery: &D, payload: Payload) -> Result<Outcome, HandlerError>
where
    D: Deliver + ?Sized,
{
    let now_millis = chrono::Utc::now().timestamp_millis();

    match compose::compose(payload, now_millis) {
        Composition::Skipped(reason) => {
            info!("Skipping webhook: {}", reason);
            Ok(Outcome::Skipped(reason))
        }
        Composition::Ready(batch) => {
            debug!("Composed batch: {:?}", batch);
            delivery
                .deliver(&batch)
                .await
                .inspect_err(|error| error!(?error, "Failed to deliver batch"))?;
            Ok(Outcome::Delivered {
                insert_id: batch.insert_id().to_string(),
            })
        }
    }
}

pub fn respond(result: Result<Outcome, HandlerError>) -> ApiGatewayV2httpResponse {
    let (status_code, body) = match result {
        Ok(outcome) => (200, outcome.to_body()),
        Err(error) => (error.status_code(), error.to_body()),
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    ApiGatewayV2httpResponse {
        status_code: i64::from(status_code),
        headers,
        body: Some(Body::Text(body.to_string())),
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_respond_skipped() {
        let response = respond(Ok(Outcome::Skipped(SkipReason::NoDeviceId)));
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let Some(Body::Text(body)) = response.body else {
            panic!("expected a text body");
        };
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({"ok": true, "result": "skipped", "reason": "no device id"})
        );
    }

    #[test]
    fn test_respond_error() {
        let response = respond(Err(HandlerError::Unauthorized));
        assert_eq!(response.status_code, 401);
        let Some(Body::Text(body)) = response.body else {
            panic!("expected a text body");
        };
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"ok": false, "error": "unauthorized"})
        );
    }
}
