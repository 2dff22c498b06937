use serde_json::{json, Value};

use crate::amplitude::client::DeliveryError;

/// Everything that can stop a webhook from being forwarded.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Delivery(DeliveryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DeliveryError> for HandlerError {
    fn from(error: DeliveryError) -> Self {
        match error {
            // a batch we cannot encode is our fault, not the network's
            DeliveryError::Encode(e) => HandlerError::Internal(e.to_string()),
            other => HandlerError::Delivery(other),
        }
    }
}

impl HandlerError {
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::Unauthorized => 401,
            HandlerError::MethodNotAllowed => 405,
            HandlerError::BadRequest(_) => 400,
            HandlerError::Delivery(_) => 502,
            HandlerError::Internal(_) => 500,
        }
    }

    /// Whether the webhook sender should repeat the delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Delivery(_))
    }

    pub fn to_body(&self) -> Value {
        match self {
            HandlerError::Delivery(DeliveryError::Status { status, body }) => json!({
                "ok": false,
                "error": self.to_string(),
                "status": status,
                "body": body,
            }),
            _ => json!({
                "ok": false,
                "error": self.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HandlerError::Unauthorized.status_code(), 401);
        assert_eq!(HandlerError::MethodNotAllowed.status_code(), 405);
        assert_eq!(HandlerError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(HandlerError::Internal("x".into()).status_code(), 500);

        let downstream = HandlerError::from(DeliveryError::Status {
            status: 429,
            body: "slow down".to_string(),
        });
        assert_eq!(downstream.status_code(), 502);
        assert!(downstream.is_retryable());
        assert!(!HandlerError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_downstream_body_is_carried() {
        let err = HandlerError::from(DeliveryError::Status {
            status: 400,
            body: r#"{"code":400,"error":"invalid"}"#.to_string(),
        });
        assert_eq!(
            err.to_body(),
            json!({
                "ok": false,
                "error": r#"ingestion API responded with 400: {"code":400,"error":"invalid"}"#,
                "status": 400,
                "body": r#"{"code":400,"error":"invalid"}"#,
            })
        );
    }

    #[test]
    fn test_encode_failure_is_internal() {
        let encode = serde_json::from_str::<Value>("{").unwrap_err();
        let err = HandlerError::from(DeliveryError::Encode(encode));
        assert!(matches!(err, HandlerError::Internal(_)));
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 500);
    }
}
