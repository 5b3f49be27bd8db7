//! Gemini-backed task parsing with rule-based fallback.
//!
//! The model is asked for a single JSON object with the same fields as
//! [`ParsedTask`]. Anything short of a usable object (no key configured,
//! transport error, timeout, unparseable text, missing `title`) falls back to
//! [`tempo_shared::parser::parse`] on the same input. There are no retries.

use chrono::{Duration, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempo_shared::{
    normalize_time_slot, parse_date, parser, Category, ParsedTask, Priority, DEFAULT_DURATION,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeminiConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("response had no text")]
    EmptyResponse,
    #[error("no JSON object in response")]
    NoJsonObject,
    #[error("JSON object has no usable title")]
    MissingTitle,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Thin client for the `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, AiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends `prompt` and returns the text of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response: GenerateResponse = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Parser front door: Gemini when configured, rule-based otherwise.
pub struct AiParser {
    gemini: Option<GeminiClient>,
}

impl AiParser {
    pub fn new(config: Option<&GeminiConfig>) -> Result<Self, AiError> {
        let gemini = config.map(GeminiClient::new).transpose()?;
        Ok(Self { gemini })
    }

    pub fn disabled() -> Self {
        Self { gemini: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.gemini.is_some()
    }

    /// Never fails; any model problem yields the rule-based result.
    pub async fn parse(&self, input: &str, reference_date: NaiveDate) -> ParsedTask {
        let Some(client) = &self.gemini else {
            return parser::parse(input, reference_date);
        };
        match parse_with_model(client, input, reference_date).await {
            Ok(parsed) => {
                debug!("Gemini parsed '{}' as '{}'", input, parsed.title);
                parsed
            }
            Err(e) => {
                warn!("Gemini parse failed ({}), using rule-based parser", e);
                parser::parse(input, reference_date)
            }
        }
    }
}

async fn parse_with_model(
    client: &GeminiClient,
    input: &str,
    reference_date: NaiveDate,
) -> Result<ParsedTask, AiError> {
    let text = client.generate(&build_prompt(input, reference_date)).await?;
    let object = extract_json_object(&text).ok_or(AiError::NoJsonObject)?;
    from_model_output(&object, reference_date).ok_or(AiError::MissingTitle)
}

pub fn build_prompt(input: &str, reference_date: NaiveDate) -> String {
    let today = reference_date.format("%Y-%m-%d");
    let weekday = reference_date.format("%A");
    let tomorrow = (reference_date + Duration::days(1)).format("%Y-%m-%d");
    let upcoming: Vec<String> = (1..=7)
        .map(|offset| {
            let day = reference_date + Duration::days(offset);
            format!(
                "- {}: {}",
                day.format("%A").to_string().to_lowercase(),
                day.format("%Y-%m-%d")
            )
        })
        .collect();

    format!(
        r#"You turn a short task description into structured data. Reply with ONLY one JSON object.

Today: {today} ({weekday})
Tomorrow: {tomorrow}
Upcoming weekdays:
{upcoming}

Task description: "{input}"

JSON fields:
- "title": clear, properly capitalized task title
- "description": one or two helpful sentences, or an empty string
- "date": YYYY-MM-DD; {today} when no date is given; use the weekday dates above for day names
- "time_slot": 24-hour "HH:MM", or null when no time is given
- "duration": minutes (15, 30, 45, 60, 90, 120 or 180), estimated from the kind of task
- "priority": "low", "medium" or "high"
- "category": one of work, personal, health, errands, finance, social, learning, home, other

Categories:
- work: job tasks, meetings, projects, emails, deadlines
- personal: self-care, hobbies, appointments
- health: gym, doctor, exercise, medicine, wellness
- errands: shopping, returns, pickups, deliveries, packages
- finance: bills, banking, taxes, payments
- social: calls, meetups, events with friends or family
- learning: study, courses, reading, practice
- home: cleaning, cooking, repairs, organizing
- other: anything else

No markdown, no explanation, JSON only:"#,
        upcoming = upcoming.join("\n"),
    )
}

/// Finds the first JSON object in model output, ignoring code fences and any
/// surrounding prose. Nested values are fine.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let cleaned = text.replace("```json", "").replace("```", "");
    cleaned.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&cleaned[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

/// Normalizes a model object into a [`ParsedTask`]. `None` without a title.
pub fn from_model_output(object: &Map<String, Value>, reference_date: NaiveDate) -> Option<ParsedTask> {
    let str_field = |key: &str| object.get(key).and_then(Value::as_str).map(str::trim);

    let title = str_field("title").filter(|t| !t.is_empty())?.to_string();
    let time_slot = str_field("time_slot").and_then(normalize_time_slot);
    let duration = object
        .get("duration")
        .and_then(Value::as_u64)
        .and_then(|d| u32::try_from(d).ok())
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_DURATION);

    Some(ParsedTask {
        title,
        description: str_field("description").unwrap_or_default().to_string(),
        date: str_field("date").and_then(parse_date).unwrap_or(reference_date),
        time_slot,
        duration,
        priority: str_field("priority")
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_default(),
        category: str_field("category")
            .and_then(|c| c.to_ascii_lowercase().parse::<Category>().ok())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn prompt_carries_date_context() {
        let prompt = build_prompt("Dentist friday", monday());
        assert!(prompt.contains("Today: 2024-01-01 (Monday)"));
        assert!(prompt.contains("Tomorrow: 2024-01-02"));
        assert!(prompt.contains("- friday: 2024-01-05"));
        // today's weekday points at next week, as in the rule-based parser
        assert!(prompt.contains("- monday: 2024-01-08"));
        assert!(prompt.contains("\"Dentist friday\""));
    }

    #[test]
    fn extracts_object_from_fenced_output() {
        let text = "```json\n{\"title\": \"Gym\", \"duration\": 45}\n```";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["title"], "Gym");
    }

    #[test]
    fn extracts_nested_object_with_surrounding_prose() {
        let text = r#"Sure! {"title": "Trip", "meta": {"source": "model"}} Hope that helps."#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["meta"]["source"], "model");
    }

    #[test]
    fn skips_broken_braces_before_real_object() {
        let text = r#"{oops} then {"title": "Read"}"#;
        assert_eq!(extract_json_object(text).unwrap()["title"], "Read");
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn model_output_without_title_is_rejected() {
        let map = object(json!({"date": "2024-01-03"}));
        assert!(from_model_output(&map, monday()).is_none());
        let map = object(json!({"title": "   "}));
        assert!(from_model_output(&map, monday()).is_none());
    }

    #[test]
    fn model_output_is_normalized() {
        let map = object(json!({
            "title": "Quarterly taxes",
            "description": "File the Q1 estimate.",
            "date": "next week",
            "time_slot": "25:00",
            "duration": 0,
            "priority": "URGENT",
            "category": "Finance"
        }));
        let parsed = from_model_output(&map, monday()).unwrap();
        assert_eq!(parsed.title, "Quarterly taxes");
        assert_eq!(parsed.description, "File the Q1 estimate.");
        assert_eq!(parsed.date, monday());
        assert_eq!(parsed.time_slot, None);
        assert_eq!(parsed.duration, 60);
        assert_eq!(parsed.priority, Priority::Medium);
        assert_eq!(parsed.category, Category::Finance);
    }

    #[test]
    fn model_output_keeps_valid_fields() {
        let map = object(json!({
            "title": "Standup",
            "date": "2024-01-04",
            "time_slot": "9:05",
            "duration": 15,
            "priority": "high",
            "category": "work"
        }));
        let parsed = from_model_output(&map, monday()).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(parsed.time_slot.as_deref(), Some("09:05"));
        assert_eq!(parsed.duration, 15);
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.category, Category::Work);
    }

    #[tokio::test]
    async fn disabled_parser_uses_rules() {
        let ai = AiParser::disabled();
        assert!(!ai.is_enabled());
        let parsed = ai.parse("Team meeting at 3pm", monday()).await;
        assert_eq!(parsed, parser::parse("Team meeting at 3pm", monday()));
    }
}
