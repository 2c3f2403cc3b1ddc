use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AsciimateError, AsciimateResult},
    loader::decode_frame,
    model::{Frame, FrameRequest},
};

/// Default chat-completions endpoint of the hosted gateway.
pub const DEFAULT_ENDPOINT: &str = "https://api.llmgateway.io/v1/chat/completions";
/// Default generative-image model id.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Explicit gateway configuration.
///
/// The credential is a plain field so tests and callers never depend on
/// process-wide state.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    /// Per-call timeout; expiry surfaces as a transient network error.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn validate(&self) -> AsciimateResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(AsciimateError::auth("gateway api key is missing"));
        }
        Ok(())
    }
}

/// The one seam to the outside world: image + prompt in, frame out.
///
/// Production uses [`HttpGateway`]; tests substitute a stub so no network
/// access happens during verification.
pub trait FrameSource: Sync {
    /// Identifier of the underlying model (used for cache keys).
    fn model_id(&self) -> &str;

    /// Issue one generation call. Exactly one outbound request, no caching.
    fn request_frame(&self, req: FrameRequest<'_>) -> AsciimateResult<Frame>;
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    images: Vec<ResponseImage>,
}

#[derive(Deserialize)]
struct ResponseImage {
    image_url: ImageUrl,
}

fn build_payload<'a>(model: &'a str, image_png_b64: &str, prompt: &'a str) -> ChatPayload<'a> {
    ChatPayload {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{image_png_b64}"),
                    },
                },
            ],
        }],
    }
}

/// Map an HTTP status to the error taxonomy.
///
/// 401/403 are credential rejections and must never be retried; 429 and 5xx
/// are treated as transient.
pub(crate) fn status_error(status: u16, body: &[u8]) -> AsciimateError {
    let detail = String::from_utf8_lossy(body);
    let detail = truncated(detail.trim(), 200);
    match status {
        401 | 403 => {
            AsciimateError::auth(format!("gateway rejected credential (http {status}): {detail}"))
        }
        429 | 500..=599 => AsciimateError::network(format!(
            "transient gateway failure (http {status}): {detail}"
        )),
        _ => AsciimateError::model(format!("gateway returned http {status}: {detail}")),
    }
}

fn truncated(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

/// Pull the generated frame out of a successful gateway response body.
///
/// The service replies with a base64 data URI; anything else is a model
/// error, including image bytes that do not decode.
pub(crate) fn extract_frame(body: &[u8]) -> AsciimateResult<Frame> {
    let resp: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| AsciimateError::model(format!("unparseable gateway response: {e}")))?;

    let url = resp
        .choices
        .first()
        .and_then(|c| c.message.images.first())
        .map(|img| img.image_url.url.as_str())
        .ok_or_else(|| AsciimateError::model("gateway response contained no image"))?;

    let (_, b64) = url
        .split_once("base64,")
        .ok_or_else(|| AsciimateError::model("gateway image url is not a base64 data uri"))?;

    let bytes = BASE64
        .decode(b64)
        .map_err(|e| AsciimateError::model(format!("gateway image payload is not base64: {e}")))?;

    decode_frame(&bytes)
        .map_err(|e| AsciimateError::model(format!("gateway returned an undecodable image: {e}")))
}

/// Blocking HTTP implementation of [`FrameSource`].
pub struct HttpGateway {
    cfg: GatewayConfig,
    client: reqwest::blocking::Client,
}

impl HttpGateway {
    pub fn new(cfg: GatewayConfig) -> AsciimateResult<Self> {
        cfg.validate()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| AsciimateError::network(format!("failed to build http client: {e}")))?;
        Ok(Self { cfg, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.cfg
    }
}

impl FrameSource for HttpGateway {
    fn model_id(&self) -> &str {
        &self.cfg.model
    }

    fn request_frame(&self, req: FrameRequest<'_>) -> AsciimateResult<Frame> {
        let png = req.image.to_png_bytes()?;
        let payload = build_payload(&self.cfg.model, &BASE64.encode(&png), req.prompt);

        tracing::debug!(model = %self.cfg.model, prompt = %req.prompt, "requesting frame");
        let resp = self
            .client
            .post(&self.cfg.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .json(&payload)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AsciimateError::network(format!("gateway call timed out: {e}"))
                } else {
                    AsciimateError::network(format!("gateway call failed: {e}"))
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| AsciimateError::network(format!("failed to read gateway reply: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(status_error(status, &body));
        }
        extract_frame(&body)
    }
}
