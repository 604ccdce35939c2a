//! OpenAI implementation of the Refiner trait.
//!
//! Uses chat completions with a JSON response format. Any internal
//! failure — missing key, transport error, unparseable output — degrades
//! to a deterministic fallback payload built from the current fields, so
//! refiner failure is never pipeline failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::security::SecretString;
use crate::traits::refiner::{PublicationMeta, Refiner};
use crate::types::config::LedgerConfig;
use crate::types::incident::IncidentRecord;
use crate::types::refinement::{sanitize_place, RefinementPayload};

const SYSTEM_PROMPT: &str = "You are an alpine-incident information extractor. \
Extract only facts present in the passage. If a field is unknown, leave it null. \
Prefer Canadian/US mountain contexts; do not invent places. \
Return STRICT JSON matching the schema keys.";

/// Passage clip size, to stay under request limits.
const PASSAGE_LIMIT: usize = 8000;

/// OpenAI-backed refiner.
pub struct OpenAiRefiner {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiRefiner {
    /// Create a new refiner with the given API key and model.
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Build from configuration; None when no API key is set.
    pub fn from_config(config: &LedgerConfig) -> Option<Self> {
        config
            .openai_api_key
            .clone()
            .map(|key| Self::new(key, config.openai_model.clone()))
    }

    /// Set a custom base URL (for proxies or compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// The minimal payload returned when the model cannot be consulted:
    /// current fields echoed back so the merge is a no-op.
    fn fallback_payload(current: &IncidentRecord) -> RefinementPayload {
        RefinementPayload {
            jurisdiction: current.jurisdiction.map(|j| j.code().to_string()),
            location_name: current
                .location_name
                .as_deref()
                .and_then(sanitize_place),
            peak_name: current.peak_name.as_deref().and_then(sanitize_place),
            activity: Some(
                current
                    .activity
                    .map(|a| a.as_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            n_fatalities: current.n_fatalities,
            date_of_death: current.date_of_death,
            extraction_conf: 0.0,
            ..Default::default()
        }
    }

    fn user_prompt(
        combined_text: &str,
        meta: &PublicationMeta,
        current: &IncidentRecord,
    ) -> String {
        let mut end = PASSAGE_LIMIT.min(combined_text.len());
        while end < combined_text.len() && !combined_text.is_char_boundary(end) {
            end += 1;
        }
        let passage = &combined_text[..end];

        let current_fields = serde_json::json!({
            "jurisdiction": current.jurisdiction.map(|j| j.code()),
            "location_name": current.location_name,
            "peak_name": current.peak_name,
            "route_name": current.route_name,
            "activity": current.activity.map(|a| a.as_str()),
            "cause_primary": current.cause_primary,
            "contributing_factors": current.contributing_factors,
            "n_fatalities": current.n_fatalities,
            "n_injured": current.n_injured,
            "party_size": current.party_size,
            "date_event_start": current.date_event_start,
            "date_event_end": current.date_event_end,
            "date_of_death": current.date_of_death,
            "names_deceased": current.names_deceased,
            "names_relatives": current.names_relatives,
            "names_responders": current.names_responders,
            "names_spokespersons": current.names_spokespersons,
            "names_medics": current.names_medics,
        });
        let publication = serde_json::json!({
            "publisher": meta.publisher,
            "article_title": meta.article_title,
            "date_published": meta.date_published,
        });

        format!(
            "Passage:\n```\n{passage}\n```\n\n\
             Publication metadata:\n{publication}\n\n\
             Current fields (may be incomplete):\n{current_fields}\n\n\
             Instructions:\n\
             - Your output will OVERRIDE existing values: if you can improve or correct, do so.\n\
             - Correct jurisdiction (BC/AB/WA), location_name, and infer the nearest named peak if present.\n\
             - If a trail/route name is present (e.g., Pacific Crest Trail), set route_name accordingly.\n\
             - Prefer the article's published date year when normalizing event dates if the passage omits a year.\n\
             - Set activity to one of: alpinism, climbing, hiking, ski-mountaineering, unknown.\n\
             - Determine n_fatalities and date_of_death from the passage if available.\n\
             - Provide concise summary_bullets (3-6) and evidence quotes. Include at least one evidence quote for any field you set.\n\
             - Populate sar segments (op_type: search|recovery|rescue) if mentioned, with agencies when the passage names them.\n\
             - Include categorized names (deceased, relatives, responders, spokespersons, medics).\n\
             - Also output publisher and article_title if apparent from the passage or URL.\n"
        )
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| crate::error::LedgerError::Refiner(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::error::LedgerError::Refiner(
                format!("OpenAI API error {status}: {body}").into(),
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| crate::error::LedgerError::Refiner(Box::new(e)))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| crate::error::LedgerError::Refiner("no choices in response".into()))
    }
}

#[async_trait]
impl Refiner for OpenAiRefiner {
    async fn refine(
        &self,
        combined_text: &str,
        meta: &PublicationMeta,
        current: &IncidentRecord,
    ) -> Result<RefinementPayload> {
        if combined_text.trim().is_empty() {
            warn!("refine: empty context, returning fallback payload");
            return Ok(Self::fallback_payload(current));
        }

        info!(
            model = %self.model,
            text_len = combined_text.len(),
            "refine: invoking model"
        );
        let user = Self::user_prompt(combined_text, meta, current);

        let mut payload = match self.complete(SYSTEM_PROMPT, &user).await {
            Ok(content) => match RefinementPayload::from_llm_text(&content) {
                Some(payload) => payload,
                None => {
                    warn!("refine: unparseable model output, returning fallback payload");
                    Self::fallback_payload(current)
                }
            },
            Err(e) => {
                warn!(error = %e, "refine: model call failed, returning fallback payload");
                Self::fallback_payload(current)
            }
        };

        // Final place sanitization before the merge sees the payload
        payload.location_name = payload.location_name.as_deref().and_then(sanitize_place);
        payload.peak_name = payload.peak_name.as_deref().and_then(sanitize_place);
        Ok(payload)
    }
}

// Request/Response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::incident::{Activity, Jurisdiction};
    use uuid::Uuid;

    #[test]
    fn test_fallback_payload_echoes_current_fields() {
        let mut record = IncidentRecord::new(Uuid::new_v4());
        record.jurisdiction = Some(Jurisdiction::BC);
        record.activity = Some(Activity::Climbing);
        record.location_name = Some("Atwell Peak, near Squamish".to_string());
        record.n_fatalities = Some(3);

        let payload = OpenAiRefiner::fallback_payload(&record);
        assert_eq!(payload.jurisdiction.as_deref(), Some("BC"));
        assert_eq!(payload.activity.as_deref(), Some("climbing"));
        assert_eq!(payload.location_name.as_deref(), Some("Atwell Peak"));
        assert_eq!(payload.n_fatalities, Some(3));
        assert_eq!(payload.confidence(), 0.0);
    }

    #[test]
    fn test_fallback_activity_defaults_to_unknown() {
        let record = IncidentRecord::new(Uuid::new_v4());
        let payload = OpenAiRefiner::fallback_payload(&record);
        assert_eq!(payload.activity.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_user_prompt_clips_passage() {
        let record = IncidentRecord::new(Uuid::new_v4());
        let meta = PublicationMeta::default();
        let long_text = "word ".repeat(10_000);
        let prompt = OpenAiRefiner::user_prompt(&long_text, &meta, &record);
        assert!(prompt.len() < long_text.len());
        assert!(prompt.contains("Instructions:"));
    }
}
