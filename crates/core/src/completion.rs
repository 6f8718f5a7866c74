//! Client for the generative text/vision completion service.
//!
//! Requests are `generateContent` calls whose body is a list of conversation turns. A turn
//! holds text parts and, for the image analysis pages, base64 `inlineData` parts. Only
//! `candidates[0].content.parts[0].text` of the reply is used.
//!
//! A reply without that field is not an error: [`CompletionClient::generate`] returns `None`
//! and callers substitute the "no information" placeholder.

use crate::config::CompletionConfig;
use crate::constants::GEMINI_API_KEY_HEADER;
use crate::retry::{HttpRequest, HttpTransport, RetryingClient};
use crate::{CareError, CareResult};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Speaker of a turn, as the completion service names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// Inline binary payload, base64-encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    /// Encode raw image bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(inline_data: InlineData) -> Self {
        Part::InlineData { inline_data }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<TurnRole>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some(TurnRole::User),
            parts,
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(TurnRole::Model),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present.
    pub fn first_text(&self) -> Option<&str> {
        let content = self.candidates.first()?.content.as_ref()?;
        match content.parts.first()? {
            Part::Text { text } => Some(text.as_str()),
            Part::InlineData { .. } => None,
        }
    }
}

/// Extract the reply text from a raw response body, tolerating any shape.
pub fn extract_reply_text(body: &[u8]) -> Option<String> {
    let parsed: GenerateContentResponse = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("completion reply is not the expected JSON: {}", e);
            return None;
        }
    };
    let text = parsed.first_text().map(str::to_owned);
    if text.is_none() {
        tracing::warn!("completion reply has no candidate text");
    }
    text
}

/// Sends `generateContent` requests through a [`RetryingClient`].
#[derive(Clone, Debug)]
pub struct CompletionClient<T> {
    http: RetryingClient<T>,
    config: CompletionConfig,
}

impl<T: HttpTransport> CompletionClient<T> {
    pub fn new(http: RetryingClient<T>, config: CompletionConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn http(&self) -> &RetryingClient<T> {
        &self.http
    }

    fn request(&self, contents: Vec<Content>) -> CareResult<HttpRequest> {
        let body = GenerateContentRequest { contents };
        Ok(HttpRequest::post_json(self.config.generate_content_url(), &body)?
            .header(GEMINI_API_KEY_HEADER, self.config.api_key()))
    }

    /// Send `contents` and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if `contents` is empty, and the retry helper's error
    /// if the request fails. A reply without text is `Ok(None)`.
    pub async fn generate(
        &self,
        contents: Vec<Content>,
        cancel: Option<&CancellationToken>,
    ) -> CareResult<Option<String>> {
        if contents.is_empty() {
            return Err(CareError::InvalidInput(
                "completion request needs at least one turn".into(),
            ));
        }

        let request = self.request(contents)?;
        let resp = match cancel {
            Some(token) => self.http.fetch_cancellable(&request, token).await?,
            None => self.http.fetch(&request).await?,
        };
        Ok(extract_reply_text(&resp.body))
    }

    /// Single-turn text prompt.
    ///
    /// # Errors
    ///
    /// As [`CompletionClient::generate`].
    pub async fn prompt(&self, text: &str) -> CareResult<Option<String>> {
        self.generate(vec![Content::user(vec![Part::text(text)])], None)
            .await
    }

    /// Single-turn prompt with an attached image.
    ///
    /// # Errors
    ///
    /// As [`CompletionClient::generate`].
    pub async fn prompt_with_image(
        &self,
        text: &str,
        image: InlineData,
    ) -> CareResult<Option<String>> {
        let parts = vec![Part::text(text), Part::image(image)];
        self.generate(vec![Content::user(parts)], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::test_support::{Reply, ScriptedTransport};
    use serde_json::json;

    fn config() -> CompletionConfig {
        CompletionConfig::new(
            "https://completion.test".into(),
            "test-model".into(),
            "secret-key".into(),
        )
        .unwrap()
    }

    fn client(replies: Vec<Reply>) -> CompletionClient<ScriptedTransport> {
        CompletionClient::new(
            RetryingClient::new(ScriptedTransport::new(replies), RetryPolicy::default()),
            config(),
        )
    }

    fn reply_with(text: &str) -> Reply {
        Reply::json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        }))
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: vec![
                Content::user(vec![Part::text("hi")]),
                Content::model_text("hello"),
                Content::user(vec![
                    Part::text("look"),
                    Part::image(InlineData::from_bytes("image/png", b"png")),
                ]),
            ],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] },
                    { "role": "user", "parts": [
                        { "text": "look" },
                        { "inlineData": { "mimeType": "image/png", "data": "cG5n" } }
                    ] }
                ]
            })
        );
    }

    #[test]
    fn test_extract_reply_text_missing_field() {
        assert_eq!(extract_reply_text(br#"{"candidates":[]}"#), None);
        assert_eq!(extract_reply_text(br#"{}"#), None);
        assert_eq!(extract_reply_text(b"not json"), None);
        assert_eq!(
            extract_reply_text(br#"{"candidates":[{"content":{"parts":[]}}]}"#),
            None
        );
    }

    #[test]
    fn test_extract_reply_text_present() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"Rest well"}]}}]}"#;
        assert_eq!(extract_reply_text(body).as_deref(), Some("Rest well"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_sends_key_header_and_model_url() {
        let client = client(vec![reply_with("answer")]);

        let text = client.prompt("question").await.unwrap();

        assert_eq!(text.as_deref(), Some("answer"));
        let requests = client.http().transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://completion.test/v1beta/models/test-model:generateContent"
        );
        assert!(requests[0]
            .headers
            .iter()
            .any(|(k, v)| k == GEMINI_API_KEY_HEADER && v == "secret-key"));
        assert!(!requests[0].url.contains("secret-key"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_retries_rate_limit() {
        let client = client(vec![Reply::status(429, ""), reply_with("after wait")]);

        let text = client.prompt("question").await.unwrap();

        assert_eq!(text.as_deref(), Some("after wait"));
        assert_eq!(client.http().transport().attempt_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_with_image_encodes_inline_data() {
        let client = client(vec![reply_with("a tablet")]);

        client
            .prompt_with_image("what is this", InlineData::from_bytes("image/jpeg", &[1, 2, 3]))
            .await
            .unwrap();

        let requests = client.http().transport().requests();
        let body: serde_json::Value =
            serde_json::from_slice(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_rejects_empty_turns() {
        let client = client(vec![]);
        let err = client.generate(vec![], None).await.unwrap_err();
        assert!(matches!(err, CareError::InvalidInput(_)));
    }
}
