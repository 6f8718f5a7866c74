//! Fixed prompts used by the analysis pages.

use crate::completion::{CompletionClient, Content, InlineData, Part};
use crate::markdown::FormattedResponse;
use crate::retry::HttpTransport;
use crate::{CareError, CareResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

const SKIN_REMEDY_FORMAT: &str = "Use bullet points with common kitchen/home ingredients. \
For example: \"➤ Apple Cider Vinegar: ...\". Ensure each remedy is on a new line and formatted \
with the '➤' bullet point. Do not use markdown for headings or bolding.";

const SKIN_REMEDY_IMAGE_INTRO: &str = "Analyze the skin condition in the provided image and \
suggest 4-6 simple natural home remedies.";

const MEDICINE_PROMPT: &str = "Analyze this image and describe the tablet or tonic details.";

const REPORT_PROMPT: &str = "Analyze this medical report. Summarize the key findings, point out \
any values outside the normal range and suggest questions to ask a doctor.";

/// Which analysis page a request comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Home remedies for a described or photographed skin problem.
    SkinRemedy,
    /// Identification of a tablet or tonic.
    Medicine,
    /// Reading of a medical report.
    Report,
}

impl AnalysisKind {
    /// Prompt text for this kind of analysis.
    ///
    /// `description` is the user's own words, and `has_image` says whether a picture is
    /// attached. Skin remedies use a different prompt for each case.
    pub fn prompt(&self, description: Option<&str>, has_image: bool) -> String {
        match self {
            AnalysisKind::SkinRemedy if has_image => {
                format!("{SKIN_REMEDY_IMAGE_INTRO} {SKIN_REMEDY_FORMAT}")
            }
            AnalysisKind::SkinRemedy => format!(
                "Suggest 4-6 simple natural home remedies for skin issue: {}. {}",
                description.unwrap_or_default().trim(),
                SKIN_REMEDY_FORMAT
            ),
            AnalysisKind::Medicine if has_image => MEDICINE_PROMPT.to_string(),
            AnalysisKind::Medicine => with_description(MEDICINE_PROMPT, description),
            AnalysisKind::Report => with_description(REPORT_PROMPT, description),
        }
    }

    /// Build the single user turn for this analysis.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if neither a description nor an image is given.
    pub fn build_request(
        &self,
        description: Option<&str>,
        image: Option<InlineData>,
    ) -> CareResult<Content> {
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        if description.is_none() && image.is_none() {
            return Err(CareError::InvalidInput(
                "provide a text query or an image".into(),
            ));
        }

        let mut parts = vec![Part::text(self.prompt(description, image.is_some()))];
        if let Some(image) = image {
            parts.push(Part::image(image));
        }
        Ok(Content::user(parts))
    }
}

/// Run one analysis and format the reply.
///
/// # Errors
///
/// Returns `CareError::InvalidInput` if there is nothing to analyse, or the completion
/// client's error if the request fails. A reply without text formats as the placeholder.
pub async fn analyse<T: HttpTransport>(
    client: &CompletionClient<T>,
    kind: AnalysisKind,
    description: Option<&str>,
    image: Option<InlineData>,
    cancel: Option<&CancellationToken>,
) -> CareResult<FormattedResponse> {
    let request = kind.build_request(description, image)?;
    tracing::info!("running {:?} analysis", kind);
    let reply = client.generate(vec![request], cancel).await?;
    Ok(FormattedResponse::from_optional(reply.as_deref()))
}

impl FromStr for AnalysisKind {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "skin_remedy" | "skin" => Ok(AnalysisKind::SkinRemedy),
            "medicine" | "tablet" | "tonic" => Ok(AnalysisKind::Medicine),
            "report" => Ok(AnalysisKind::Report),
            other => Err(CareError::InvalidInput(format!(
                "unknown analysis kind: {other}"
            ))),
        }
    }
}

fn with_description(prompt: &str, description: Option<&str>) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => format!("{prompt}\n\nDetails from the user: {d}"),
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompletionConfig;
    use crate::retry::{RetryPolicy, RetryingClient};
    use crate::test_support::{Reply, ScriptedTransport};
    use serde_json::json;

    #[test]
    fn test_skin_remedy_text_prompt_includes_problem() {
        let prompt = AnalysisKind::SkinRemedy.prompt(Some(" dry skin "), false);
        assert!(prompt.starts_with("Suggest 4-6 simple natural home remedies for skin issue: dry skin."));
        assert!(prompt.contains("'➤' bullet point"));
    }

    #[test]
    fn test_skin_remedy_image_prompt() {
        let prompt = AnalysisKind::SkinRemedy.prompt(Some("ignored"), true);
        assert!(prompt.starts_with("Analyze the skin condition in the provided image"));
        assert!(!prompt.contains("ignored"));
    }

    #[test]
    fn test_medicine_prompt_with_image_is_fixed() {
        assert_eq!(AnalysisKind::Medicine.prompt(None, true), MEDICINE_PROMPT);
    }

    #[test]
    fn test_report_prompt_appends_description() {
        let prompt = AnalysisKind::Report.prompt(Some("HbA1c 7.2"), false);
        assert!(prompt.starts_with("Analyze this medical report."));
        assert!(prompt.ends_with("Details from the user: HbA1c 7.2"));
    }

    #[test]
    fn test_build_request_needs_text_or_image() {
        let err = AnalysisKind::Medicine.build_request(Some("   "), None).unwrap_err();
        assert!(matches!(err, CareError::InvalidInput(_)));
    }

    #[test]
    fn test_build_request_attaches_image_after_prompt() {
        let content = AnalysisKind::Medicine
            .build_request(None, Some(InlineData::from_bytes("image/png", b"x")))
            .unwrap();
        assert_eq!(content.parts.len(), 2);
        assert_eq!(content.parts[0], Part::text(MEDICINE_PROMPT));
        assert!(matches!(content.parts[1], Part::InlineData { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyse_formats_reply() {
        let config = CompletionConfig::new(
            "https://completion.test".into(),
            "m".into(),
            "k".into(),
        )
        .unwrap();
        let client = CompletionClient::new(
            RetryingClient::new(
                ScriptedTransport::new(vec![Reply::json(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "- Aloe vera\n- Honey" }] } }]
                }))]),
                RetryPolicy::default(),
            ),
            config,
        );

        let reply = analyse(&client, AnalysisKind::SkinRemedy, Some("rash"), None, None)
            .await
            .unwrap();

        assert_eq!(reply.to_html(), "<ul><li>Aloe vera</li><li>Honey</li></ul>");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("skin-remedy".parse::<AnalysisKind>().unwrap(), AnalysisKind::SkinRemedy);
        assert_eq!("Tablet".parse::<AnalysisKind>().unwrap(), AnalysisKind::Medicine);
        assert!("x-ray".parse::<AnalysisKind>().is_err());
    }

    #[test]
    fn test_kind_serialises_snake_case() {
        let value = serde_json::to_value(AnalysisKind::SkinRemedy).unwrap();
        assert_eq!(value, "skin_remedy");
    }
}
