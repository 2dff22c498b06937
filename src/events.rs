use aws_lambda_events::apigw::ApiGatewayV2httpRequest;
use base64::prelude::*;
use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::branch::Payload;
use crate::error::HandlerError;

/// What the function can be invoked with.
#[derive(Debug)]
pub enum Webhook {
    /// Function URL or API Gateway HTTP API request (payload format 2.0).
    Http(Box<ApiGatewayV2httpRequest>),
    /// Direct invocation with the webhook body as the event itself.
    Direct(Value),
}

impl<'de> Deserialize<'de> for Webhook {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value: Value = Deserialize::deserialize(deserializer)?;

        // a webhook body never carries requestContext, so its presence is enough
        if raw_value.get("requestContext").is_some() {
            let request = ApiGatewayV2httpRequest::deserialize(&raw_value)
                .map_err(|e| de::Error::custom(format!("malformed http event: {e}")))?;
            tracing::info!("http event detected");
            return Ok(Webhook::Http(Box::new(request)));
        }

        tracing::info!("direct invocation detected");
        Ok(Webhook::Direct(raw_value))
    }
}

/// Parses the request body into a payload, undoing base64 transport encoding.
pub fn decode_body(request: &ApiGatewayV2httpRequest) -> Result<Payload, HandlerError> {
    let raw = request.body.as_deref().unwrap_or_default();
    let bytes = if request.is_base64_encoded {
        BASE64_STANDARD
            .decode(raw)
            .map_err(|e| HandlerError::BadRequest(format!("invalid base64 body - {e}")))?
    } else {
        raw.as_bytes().to_vec()
    };
    debug!("Request body: {} bytes", bytes.len());

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| HandlerError::BadRequest(format!("invalid JSON body - {e}")))?;
    direct_payload(value)
}

pub fn direct_payload(value: Value) -> Result<Payload, HandlerError> {
    Payload::from_value(value)
        .ok_or_else(|| HandlerError::BadRequest("body must be a JSON object".to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn http_event(body: Option<&str>, base64: bool) -> Value {
        json!({
            "version": "2.0",
            "routeKey": "$default",
            "rawPath": "/",
            "rawQueryString": "",
            "headers": {
                "content-type": "application/json",
                "authorization": "Bearer s3cret"
            },
            "requestContext": {
                "accountId": "123456789012",
                "apiId": "abcdefghij",
                "domainName": "abcdefghij.lambda-url.eu-west-1.on.aws",
                "domainPrefix": "abcdefghij",
                "http": {
                    "method": "POST",
                    "path": "/",
                    "protocol": "HTTP/1.1",
                    "sourceIp": "203.0.113.7",
                    "userAgent": "Branch-Webhook/1.0"
                },
                "requestId": "c6af9ac6-7b61-11e6-9a41-93e8deadbeef",
                "routeKey": "$default",
                "stage": "$default",
                "time": "14/Nov/2023:22:13:20 +0000",
                "timeEpoch": 1700000000000_i64
            },
            "body": body,
            "isBase64Encoded": base64
        })
    }

    #[test]
    fn test_detects_http_event() {
        let evt: Webhook = serde_json::from_value(http_event(Some("{}"), false)).unwrap();
        match evt {
            Webhook::Http(request) => {
                assert_eq!(request.request_context.http.method, http::Method::POST);
                assert_eq!(request.body.as_deref(), Some("{}"));
            }
            Webhook::Direct(_) => panic!("expected http event"),
        }
    }

    #[test]
    fn test_detects_direct_invocation() {
        let evt: Webhook =
            serde_json::from_value(json!({"name": "INSTALL", "user_data": {"idfa": "A"}}))
                .unwrap();
        assert!(matches!(evt, Webhook::Direct(_)));
    }

    #[test]
    fn test_decode_plain_and_base64_bodies() {
        let body = r#"{"name":"OPEN","user_data":{"idfa":"A"}}"#;

        let plain: ApiGatewayV2httpRequest =
            serde_json::from_value(http_event(Some(body), false)).unwrap();
        let encoded = BASE64_STANDARD.encode(body);
        let wrapped: ApiGatewayV2httpRequest =
            serde_json::from_value(http_event(Some(&encoded), true)).unwrap();

        let from_plain = decode_body(&plain).unwrap();
        assert_eq!(from_plain.get("name"), Some(&json!("OPEN")));
        assert_eq!(decode_body(&wrapped).unwrap(), from_plain);
    }

    #[test]
    fn test_decode_rejects_bad_bodies() {
        for (body, base64) in [
            (None, false),
            (Some("not json"), false),
            (Some("[1,2,3]"), false),
            (Some("!!not base64!!"), true),
        ] {
            let request: ApiGatewayV2httpRequest =
                serde_json::from_value(http_event(body, base64)).unwrap();
            assert!(
                matches!(decode_body(&request), Err(HandlerError::BadRequest(_))),
                "body: {body:?}"
            );
        }
    }
}
