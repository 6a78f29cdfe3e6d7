//! Shared HTTP plumbing for the transports.

use std::time::Duration;

use forgeloop_core::error::ProviderError;
use tracing::warn;

/// Retry hint used when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Build the HTTP client shared by a transport.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to a default HTTP client");
            reqwest::Client::new()
        })
}

/// Send a prepared request and return the body of a successful response.
///
/// Status mapping: 401/403 → `AuthenticationFailed`, 429 → `RateLimited`,
/// any other non-2xx → `ApiError`. Nothing is retried.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<Vec<u8>, ProviderError> {
    let response = request.send().await.map_err(|e| map_send_error(&e))?;
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after)
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the API key (status {status})"
        )));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    let bytes = response.bytes().await.map_err(|e| map_send_error(&e))?;
    Ok(bytes.to_vec())
}

fn map_send_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// `retry-after` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after("30"), Some(30));
        assert_eq!(parse_retry_after(" 7 "), Some(7));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
