//! OpenAI-compatible aggregator client.
//!
//! One reqwest client behind all three adapter traits: chat completions for
//! text, images/edits for the outfit visualization, audio/transcriptions
//! for voice notes. Media crosses this boundary as content-addressed
//! handles naming files under the media directory.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use crate::adapters::{CompletionRequest, ImageAdapter, SpeechAdapter, TextAdapter};
use crate::config::Settings;
use crate::error::AdapterFailure;
use crate::profile::MediaHandle;

pub struct AiTunnelClient {
    http: reqwest::Client,
    base_url: String,
    chat_model: String,
    image_model: String,
    stt_model: String,
    media_dir: PathBuf,
}

impl AiTunnelClient {
    pub fn new(settings: &Settings) -> Result<Self, AdapterFailure> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", settings.api_key.expose_secret());
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth).map_err(|e| {
            AdapterFailure::Invalid {
                service: "aitunnel".into(),
                reason: format!("API key is not a valid header value: {e}"),
            }
        })?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AdapterFailure::Transient {
                service: "aitunnel".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            chat_model: settings.chat_model.clone(),
            image_model: settings.image_model.clone(),
            stt_model: settings.stt_model.clone(),
            media_dir: settings.media_dir.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    fn media_path(&self, handle: &MediaHandle) -> PathBuf {
        self.media_dir.join(handle.as_str())
    }

    async fn read_media(&self, handle: &MediaHandle) -> Result<Vec<u8>, AdapterFailure> {
        tokio::fs::read(self.media_path(handle))
            .await
            .map_err(|e| AdapterFailure::Invalid {
                service: "aitunnel".into(),
                reason: format!("missing media file {handle}: {e}"),
            })
    }

    /// Store bytes under their sha256 name and return the handle.
    async fn store_media(&self, bytes: &[u8], extension: &str) -> Result<MediaHandle, AdapterFailure> {
        let digest = Sha256::digest(bytes);
        let handle = MediaHandle::new(format!("{}.{extension}", hex::encode(digest)));
        let path = self.media_path(&handle);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| transient("aitunnel", format!("media dir: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| transient("aitunnel", format!("writing media: {e}")))?;
        Ok(handle)
    }

    async fn send_and_classify(
        &self,
        service: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, AdapterFailure> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                transient(service, "request timed out".to_string())
            } else {
                transient(service, e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(AdapterFailure::RateLimited {
                service: service.to_string(),
                retry_after,
            });
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(transient(service, format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterFailure::Invalid {
                service: service.to_string(),
                reason: format!("{status}: {body}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| transient(service, format!("invalid JSON body: {e}")))
    }
}

fn transient(service: &str, reason: String) -> AdapterFailure {
    AdapterFailure::Transient {
        service: service.to_string(),
        reason,
    }
}

fn first_choice_content(payload: &serde_json::Value) -> Option<&str> {
    payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

#[async_trait]
impl TextAdapter for AiTunnelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AdapterFailure> {
        let mut body = serde_json::json!({
            "model": self.chat_model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });
        if request.json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        tracing::debug!(purpose = %request.purpose, model = %self.chat_model, "Chat completion");
        let payload = self
            .send_and_classify("text", self.http.post(self.url("chat/completions")).json(&body))
            .await?;

        first_choice_content(&payload)
            .map(|s| s.to_string())
            .ok_or_else(|| AdapterFailure::Invalid {
                service: "text".into(),
                reason: "completion response has no choices".into(),
            })
    }
}

#[async_trait]
impl ImageAdapter for AiTunnelClient {
    async fn generate(
        &self,
        prompt: &str,
        reference_images: &[MediaHandle],
    ) -> Result<MediaHandle, AdapterFailure> {
        let mut form = Form::new()
            .text("model", self.image_model.clone())
            .text("prompt", prompt.to_string());
        for (index, handle) in reference_images.iter().enumerate() {
            let bytes = self.read_media(handle).await?;
            let part = Part::bytes(bytes)
                .file_name(format!("reference_{index}.png"))
                .mime_str("image/png")
                .map_err(|e| transient("image", e.to_string()))?;
            form = form.part("image[]", part);
        }

        tracing::debug!(
            model = %self.image_model,
            references = reference_images.len(),
            "Image generation"
        );
        let payload = self
            .send_and_classify("image", self.http.post(self.url("images/edits")).multipart(form))
            .await?;

        let entry = payload
            .get("data")
            .and_then(|d| d.get(0))
            .ok_or_else(|| AdapterFailure::Invalid {
                service: "image".into(),
                reason: "image response has no data entries".into(),
            })?;

        if let Some(b64) = entry.get("b64_json").and_then(|v| v.as_str()) {
            let bytes = BASE64.decode(b64).map_err(|e| AdapterFailure::Invalid {
                service: "image".into(),
                reason: format!("undecodable image payload: {e}"),
            })?;
            return self.store_media(&bytes, "png").await;
        }
        if let Some(url) = entry.get("url").and_then(|v| v.as_str()) {
            let bytes = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| transient("image", e.to_string()))?
                .bytes()
                .await
                .map_err(|e| transient("image", e.to_string()))?;
            return self.store_media(&bytes, "png").await;
        }

        Err(AdapterFailure::Invalid {
            service: "image".into(),
            reason: "image response carries neither b64_json nor url".into(),
        })
    }
}

#[async_trait]
impl SpeechAdapter for AiTunnelClient {
    async fn transcribe(&self, audio: &MediaHandle) -> Result<String, AdapterFailure> {
        let bytes = self.read_media(audio).await?;
        let part = Part::bytes(bytes)
            .file_name(audio.as_str().to_string())
            .mime_str("audio/ogg")
            .map_err(|e| transient("speech", e.to_string()))?;
        let form = Form::new()
            .text("model", self.stt_model.clone())
            .text("response_format", "json")
            .part("file", part);

        let payload = self
            .send_and_classify(
                "speech",
                self.http.post(self.url("audio/transcriptions")).multipart(form),
            )
            .await?;

        Ok(payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}
