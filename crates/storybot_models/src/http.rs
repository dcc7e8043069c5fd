//! Response handling shared by every client.

use reqwest::Response;
use storybot_error::{ProviderError, ProviderErrorKind};
use tracing::error;

/// Maps a transport failure to a provider error.
#[track_caller]
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> ProviderError {
    error!(provider, error = ?e, "HTTP request failed");
    ProviderError::new(ProviderErrorKind::Http(format!("Request failed: {}", e)))
}

/// Passes a successful response through, otherwise reads the body into an API error.
pub(crate) async fn ensure_success(
    provider: &str,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    error!(
        provider,
        status = %status,
        error = %error_text,
        "API error"
    );

    Err(ProviderError::new(ProviderErrorKind::Api {
        status: status.as_u16(),
        message: error_text,
    }))
}

/// Decodes a JSON body, reporting parse failures as malformed output.
pub(crate) async fn read_json<T>(provider: &str, response: Response) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    response.json().await.map_err(|e| {
        error!(provider, error = ?e, "Failed to parse response");
        ProviderError::new(ProviderErrorKind::MalformedOutput(format!(
            "Failed to parse JSON: {}",
            e
        )))
    })
}
