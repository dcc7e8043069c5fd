//! Ordered provider fallback.
//!
//! A chain tries each provider in turn, bounding every attempt by a timeout,
//! and returns the first valid output. When all providers fail the caller
//! gets one aggregate error listing every attempt.

use image::ImageFormat;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storybot_error::{
    AggregateError, AggregateErrorKind, ProviderAttempt, ProviderError, ProviderErrorKind,
};
use storybot_interface::{ImageProvider, ImageRequest, TextProvider, TextRequest};
use tracing::{debug, error, warn};

/// Anything that can sit in a fallback chain.
pub trait ChainMember: Send + Sync {
    /// Name used in logs and aggregate errors.
    fn member_name(&self) -> &str;
}

impl ChainMember for dyn TextProvider {
    fn member_name(&self) -> &str {
        self.name()
    }
}

impl ChainMember for dyn ImageProvider {
    fn member_name(&self) -> &str {
        self.name()
    }
}

/// Ordered list of interchangeable providers.
pub struct FallbackChain<P: ?Sized> {
    capability: &'static str,
    providers: Vec<Arc<P>>,
    timeout: Duration,
}

/// Chain of text providers.
pub type TextChain = FallbackChain<dyn TextProvider>;
/// Chain of image providers.
pub type ImageChain = FallbackChain<dyn ImageProvider>;

impl<P: ?Sized> Clone for FallbackChain<P> {
    fn clone(&self) -> Self {
        Self {
            capability: self.capability,
            providers: self.providers.clone(),
            timeout: self.timeout,
        }
    }
}

impl<P: ?Sized + ChainMember> std::fmt::Debug for FallbackChain<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("capability", &self.capability)
            .field("providers", &self.provider_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: ?Sized + ChainMember> FallbackChain<P> {
    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in the order they are tried.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.member_name().to_string())
            .collect()
    }

    async fn run<T, F, Fut>(
        &self,
        call: F,
        validate: fn(&T) -> Result<(), ProviderError>,
    ) -> Result<(T, String), AggregateError>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if self.providers.is_empty() {
            return Err(AggregateError::new(AggregateErrorKind::EmptyChain(
                self.capability.to_string(),
            )));
        }

        let mut attempts = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let name = provider.member_name().to_string();
            debug!(capability = self.capability, provider = %name, "Trying provider");

            let outcome = match tokio::time::timeout(self.timeout, call(Arc::clone(provider))).await
            {
                Ok(Ok(output)) => validate(&output).map(|_| output),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ProviderError::new(ProviderErrorKind::Timeout(
                    self.timeout.as_secs(),
                ))),
            };

            match outcome {
                Ok(output) => {
                    debug!(
                        capability = self.capability,
                        provider = %name,
                        failed_before = attempts.len(),
                        "Provider succeeded"
                    );
                    return Ok((output, name));
                }
                Err(e) => {
                    warn!(
                        capability = self.capability,
                        provider = %name,
                        error = %e.kind,
                        "Provider failed, trying next"
                    );
                    attempts.push(ProviderAttempt {
                        provider: name,
                        error: e.kind.to_string(),
                    });
                }
            }
        }

        error!(
            capability = self.capability,
            attempts = attempts.len(),
            "All providers failed"
        );
        Err(AggregateError::new(AggregateErrorKind::ChainExhausted {
            capability: self.capability.to_string(),
            attempts,
        }))
    }
}

impl FallbackChain<dyn TextProvider> {
    /// Creates a text chain; providers are tried in the given order.
    pub fn text(providers: Vec<Arc<dyn TextProvider>>, timeout: Duration) -> Self {
        Self {
            capability: "text",
            providers,
            timeout,
        }
    }

    /// Generates text with the first provider that returns non-empty output.
    pub async fn generate_text(&self, request: &TextRequest) -> Result<String, AggregateError> {
        self.run(
            |provider| async move { provider.generate_text(request).await },
            validate_text,
        )
        .await
        .map(|(text, _)| text)
    }
}

/// A validated image and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Detected encoding
    pub format: ImageFormat,
    /// Name of the provider that produced it
    pub provider: String,
}

impl GeneratedImage {
    /// Conventional file extension for the encoding.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

impl FallbackChain<dyn ImageProvider> {
    /// Creates an image chain; providers are tried in the given order.
    pub fn image(providers: Vec<Arc<dyn ImageProvider>>, timeout: Duration) -> Self {
        Self {
            capability: "image",
            providers,
            timeout,
        }
    }

    /// Whether any provider in the chain honours reference images.
    pub fn supports_references(&self) -> bool {
        self.providers.iter().any(|p| p.supports_references())
    }

    /// The providers that honour reference images, in chain order.
    pub fn reference_capable(&self) -> Self {
        Self {
            capability: "reference image",
            providers: self
                .providers
                .iter()
                .filter(|p| p.supports_references())
                .cloned()
                .collect(),
            timeout: self.timeout,
        }
    }

    /// Generates an image with the first provider whose output carries a
    /// PNG, JPEG or WebP signature.
    pub async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, AggregateError> {
        let ((bytes, format), provider) = self
            .run(
                |provider| async move {
                    let bytes = provider.generate_image(request).await?;
                    let format = sniff_image(&bytes)?;
                    Ok::<_, ProviderError>((bytes, format))
                },
                |_| Ok(()),
            )
            .await?;

        Ok(GeneratedImage {
            bytes,
            format,
            provider,
        })
    }
}

/// Detects a supported image encoding from leading bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => Some(format),
        _ => None,
    }
}

#[allow(clippy::ptr_arg)]
fn validate_text(text: &String) -> Result<(), ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::new(ProviderErrorKind::MissingOutput))
    } else {
        Ok(())
    }
}

fn sniff_image(bytes: &[u8]) -> Result<ImageFormat, ProviderError> {
    if bytes.is_empty() {
        return Err(ProviderError::new(ProviderErrorKind::MissingOutput));
    }
    detect_format(bytes).ok_or_else(|| ProviderError::new(ProviderErrorKind::InvalidSignature))
}
