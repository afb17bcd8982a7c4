use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::camera::auth::{DigestAuth, DigestChallenge};
use crate::config::{AuthMode, CameraConfig};
use crate::error::UpstreamError;

#[derive(Debug)]
enum Credentials {
    None,
    Basic { username: String, password: String },
    Digest(DigestAuth),
}

/// Status and body of a camera response; non-success statuses are not yet errors here.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone)]
pub struct CameraClient {
    config: CameraConfig,
    http_client: Client,
    credentials: Arc<Credentials>,
    timeout: Duration,
}

impl CameraClient {
    pub fn new(config: CameraConfig) -> Result<Self, UpstreamError> {
        let timeout = config.timeout();
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("failed to create HTTP client: {}", e)))?;

        let username = config.username.clone().unwrap_or_default();
        let password = config.password.clone().unwrap_or_default();
        let credentials = match config.auth_mode() {
            AuthMode::None => Credentials::None,
            AuthMode::Basic => Credentials::Basic { username, password },
            AuthMode::Digest => Credentials::Digest(DigestAuth::new(username, password)),
        };

        Ok(Self {
            config,
            http_client,
            credentials: Arc::new(credentials),
            timeout,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// GET a text resource, turning a non-success status into an error.
    pub async fn get_text(&self, path: &str) -> Result<String, UpstreamError> {
        let response = self.execute(Method::GET, path, None).await?;
        if !response.status.is_success() {
            return Err(UpstreamError::Status {
                status: response.status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response.body)
    }

    /// POST a JSON body. The response body is returned as text so callers can cope with
    /// error pages that are not JSON.
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.execute(Method::POST, path, Some(body)).await
    }

    /// Runs one exchange (including a digest challenge round) under the configured timeout.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        match tokio::time::timeout(self.timeout, self.exchange(method, path, body)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = format!("{}{}", self.config.base_url(), path);
        tracing::trace!("Sending {} {}", method, url);

        let response = match self.credentials.as_ref() {
            Credentials::None => self.send(self.request(&method, &url, body)).await?,
            Credentials::Basic { username, password } => {
                let request = self
                    .request(&method, &url, body)
                    .basic_auth(username, Some(password));
                self.send(request).await?
            }
            Credentials::Digest(digest) => {
                let mut request = self.request(&method, &url, body);
                if let Some(header) = digest.authorization(method.as_str(), path).await {
                    request = request.header(AUTHORIZATION, header);
                }
                let response = self.send(request).await?;

                if response.status() == StatusCode::UNAUTHORIZED {
                    let challenge = response
                        .headers()
                        .get(WWW_AUTHENTICATE)
                        .and_then(|v| v.to_str().ok())
                        .ok_or_else(|| UpstreamError::Auth("401 without digest challenge".into()))
                        .and_then(DigestChallenge::parse)?;

                    tracing::debug!("Answering digest challenge for realm {}", challenge.realm);
                    let header = digest.answer(challenge, method.as_str(), path).await;
                    let retry = self
                        .request(&method, &url, body)
                        .header(AUTHORIZATION, header);
                    let response = self.send(retry).await?;
                    if response.status() == StatusCode::UNAUTHORIZED {
                        digest.forget().await;
                        return Err(UpstreamError::Auth(format!(
                            "credentials rejected for {}",
                            path
                        )));
                    }
                    response
                } else {
                    response
                }
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::warn!("Camera returned error status {} for {}", status, path);
        }
        tracing::trace!("Received response from camera: {}", text);

        Ok(UpstreamResponse { status, body: text })
    }

    fn request(&self, method: &Method, url: &str, body: Option<&Value>) -> reqwest::RequestBuilder {
        let request = self.http_client.request(method.clone(), url);
        match body {
            Some(body) => request.json(body),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.timeout.as_millis() as u64)
            } else {
                UpstreamError::Transport(e.to_string())
            }
        })
    }
}
