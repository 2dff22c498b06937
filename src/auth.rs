use http::header::AUTHORIZATION;
use http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::error::HandlerError;

/// Gate for inbound requests: `Authorization: Bearer <token>` must match the
/// configured token.
pub fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), HandlerError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    match presented {
        Some(token) if tokens_match(token, expected) => Ok(()),
        _ => Err(HandlerError::Unauthorized),
    }
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}
