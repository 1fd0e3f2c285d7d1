//! Network-facing image processor.

use tracing::debug;

use super::{optimize, ImageError, ProcessOptions, ProcessedImage};
use crate::http_client::{HttpClient, ACCEPT_IMAGE};
use crate::rate_limit::RetryPolicy;

/// Fetches remote images and normalizes them for mirroring.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    http: HttpClient,
    retry: RetryPolicy,
    options: ProcessOptions,
}

impl ImageProcessor {
    /// Create a processor using the external-site retry profile.
    pub fn new(http: HttpClient, options: ProcessOptions) -> Self {
        Self {
            http,
            retry: RetryPolicy::external_site().with_label("image fetch"),
            options,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Download an image, downscale it if too wide, and re-encode it.
    pub async fn fetch_and_process(&self, url: &str) -> Result<ProcessedImage, ImageError> {
        let body = self
            .retry
            .run(|| self.http.get(url, ACCEPT_IMAGE))
            .await?;

        let mut processed = optimize(&body.bytes, &self.options)?;
        debug!(
            "Processed {} ({} bytes -> {} bytes, {}x{})",
            url,
            body.bytes.len(),
            processed.bytes.len(),
            processed.width,
            processed.height
        );
        processed.source_url = Some(url.to_string());
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::tests::sample_image;
    use crate::images::OutputFormat;
    use image::ImageFormat;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn processor(options: ProcessOptions) -> ImageProcessor {
        ImageProcessor::new(HttpClient::new(Duration::from_secs(5)).unwrap(), options)
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn test_fetch_and_process() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sample_image(1200, 1800, ImageFormat::Png), "image/png"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/cards/a.png", server.uri());
        let processed = processor(ProcessOptions {
            format: OutputFormat::Jpeg,
            ..Default::default()
        })
        .fetch_and_process(&url)
        .await
        .unwrap();

        assert_eq!((processed.width, processed.height), (800, 1200));
        assert_eq!(processed.format, OutputFormat::Jpeg);
        assert_eq!(processed.source_url.as_deref(), Some(url.as_str()));

        let requests = server.received_requests().await.unwrap();
        let accept = requests[0].headers.get("accept").unwrap().to_str().unwrap();
        assert!(accept.contains("image/webp"));
    }

    #[tokio::test]
    async fn test_missing_image_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = processor(ProcessOptions::default())
            .fetch_and_process(&format!("{}/gone.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_non_image_body_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let err = processor(ProcessOptions::default())
            .fetch_and_process(&format!("{}/fake.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat));
    }
}
