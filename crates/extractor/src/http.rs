use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{ExtractionError, Extractor, TextSegment};

/// The extraction backend the chat was first deployed against.
const DEFAULT_URL: &str = "https://chatbot-app-backend.onrender.com/api/prueba";
/// Multipart field carrying the document.
const FILE_FIELD: &str = "pdf_file";

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    subtitulos_texto: Vec<TextSegment>,
}

/// An [`Extractor`] that uploads the document to an HTTP endpoint.
///
/// The endpoint receives a multipart form with the document in the
/// `pdf_file` field and answers with
/// `{"subtitulos_texto": [{"text": "..."}, ...]}`.
#[derive(Clone, Debug)]
pub struct HttpExtractor {
    client: Client,
    url: String,
}

impl Default for HttpExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl HttpExtractor {
    /// Creates an extractor posting to `url`.
    #[inline]
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(
        &self,
        file_name: &str,
        document: Vec<u8>,
    ) -> Result<Vec<TextSegment>, ExtractionError> {
        let part = Part::bytes(document)
            .file_name(file_name.to_owned())
            .mime_str("application/pdf")
            .map_err(|err| ExtractionError::new(format!("{err}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        debug!("uploading {file_name} to {}", self.url);
        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| ExtractionError::new(format!("{err}")))?;
        let body = resp
            .text()
            .await
            .map_err(|err| ExtractionError::new(format!("{err}")))?;

        let segments = parse_reply(&body)?;
        debug!("extracted {} segments from {file_name}", segments.len());
        Ok(segments)
    }
}

fn parse_reply(body: &str) -> Result<Vec<TextSegment>, ExtractionError> {
    serde_json::from_str::<ExtractionReply>(body)
        .map(|reply| reply.subtitulos_texto)
        .map_err(|err| {
            ExtractionError::new(format!("unexpected reply from extractor: {err}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let segments = parse_reply(
            r#"{"subtitulos_texto": [{"text": "Intro"}, {"text": "Results", "page": 2}]}"#,
        )
        .unwrap();
        assert_eq!(
            segments,
            vec![TextSegment::new("Intro"), TextSegment::new("Results")]
        );

        let segments = parse_reply(r#"{"subtitulos_texto": []}"#).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_parse_bad_reply() {
        let err = parse_reply(r#"{"error": "not a pdf"}"#).unwrap_err();
        assert!(err.message().contains("unexpected reply"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let extractor = HttpExtractor::new("http://127.0.0.1:9/extract");
        let result = extractor.extract("doc.pdf", b"%PDF-1.4".to_vec()).await;
        assert!(result.is_err());
    }
}
