//! Client for the batch LLM sentiment annotator.
//!
//! The annotator is an external collaborator behind an OpenAI-compatible
//! chat endpoint. It receives numbered Vietnamese headlines and returns a
//! JSON array of verdicts. Everything here is best-effort: a failed batch
//! is logged and dropped, never fatal to the caller.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use tinpulse_common::{Annotation, Result, SentimentLabel, TinPulseError};

/// Max headlines per single chat request.
pub const BATCH_SIZE: usize = 15;

/// Capability trait for the batch annotator boundary. Lets the core crate
/// run against a stub in tests.
#[async_trait]
pub trait BatchAnnotator: Send + Sync {
    /// Annotate a batch of (article id, title) pairs. May return fewer
    /// annotations than inputs when individual sub-batches fail.
    async fn annotate(&self, items: &[(Uuid, String)]) -> Result<Vec<Annotation>>;

    /// Model identifier recorded alongside cached annotations.
    fn model(&self) -> &str;
}

const SYSTEM_PROMPT: &str = "\
Bạn là chuyên gia phân tích cảm xúc tin tức tài chính Việt Nam.
Nhiệm vụ: Đánh giá cảm xúc (sentiment) của từng tiêu đề tin tức về chứng khoán và tài chính.

Quy tắc chấm điểm:
- score từ -1.0 đến 1.0 (âm = tiêu cực, dương = tích cực, 0 = trung lập)
- confidence từ 0.0 đến 1.0 (mức độ chắc chắn của đánh giá)
- label: \"Positive\" (score > 0.1), \"Negative\" (score < -0.1), \"Neutral\" (còn lại)

Trả về JSON array với mỗi phần tử có dạng:
{\"idx\": <index>, \"score\": <float>, \"label\": <str>, \"confidence\": <float>, \"reasoning\": <str ngắn gọn>}";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// One element of the model's JSON array reply. `idx` is 1-based.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    idx: usize,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    label: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

fn default_confidence() -> f64 {
    0.5
}

/// Annotator backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiAnnotator {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OpenAiAnnotator {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| TinPulseError::Annotator(format!("invalid api key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn batch_prompt(titles: &[&str]) -> String {
        let numbered = titles
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Đánh giá sentiment cho {} tiêu đề tin tức sau:\n\n{}\n\n\
             Trả về JSON array (đúng format, không giải thích thêm):",
            titles.len(),
            numbered
        )
    }

    async fn annotate_chunk(&self, chunk: &[(Uuid, String)]) -> Result<Vec<Annotation>> {
        let titles: Vec<&str> = chunk.iter().map(|(_, t)| t.as_str()).collect();
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::batch_prompt(&titles),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, batch = chunk.len(), "Annotator chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| TinPulseError::Annotator(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TinPulseError::Annotator(format!(
                "annotator error ({status}): {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| TinPulseError::Annotator(format!("malformed response: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TinPulseError::Annotator("empty annotator response".to_string()))?;

        let verdicts = parse_verdicts(&content);
        if verdicts.is_empty() {
            let preview: String = content.chars().take(200).collect();
            warn!(raw = %preview, "Annotator reply held no parseable verdicts");
        }

        let annotations = verdicts
            .into_iter()
            .filter_map(|v| {
                // 1-based index back to the batch position.
                let (article_id, title) = chunk.get(v.idx.checked_sub(1)?)?;
                Some(Annotation {
                    article_id: Some(*article_id),
                    title: title.clone(),
                    score: v.score.clamp(-1.0, 1.0),
                    label: verdict_label(&v.label, v.score),
                    confidence: v.confidence.clamp(0.0, 1.0),
                    reasoning: v.reasoning,
                })
            })
            .collect();
        Ok(annotations)
    }
}

#[async_trait]
impl BatchAnnotator for OpenAiAnnotator {
    async fn annotate(&self, items: &[(Uuid, String)]) -> Result<Vec<Annotation>> {
        let mut out = Vec::with_capacity(items.len());
        for chunk in items.chunks(BATCH_SIZE) {
            match self.annotate_chunk(chunk).await {
                Ok(annotations) => out.extend(annotations),
                Err(e) => {
                    warn!(error = %e, batch = chunk.len(), "Annotator batch failed, skipping");
                }
            }
        }
        Ok(out)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// The model sometimes labels with its own coarse vocabulary; trust the
/// score when the label text is unknown.
fn verdict_label(raw: &str, score: f64) -> SentimentLabel {
    match raw.to_lowercase().as_str() {
        "neutral" => SentimentLabel::Neutral,
        "positive" | "negative" | "bullish" | "bearish" | "somewhat-bullish"
        | "somewhat-bearish" => SentimentLabel::from_str_loose(raw),
        _ => SentimentLabel::from_score(score),
    }
}

/// Extract a JSON verdict array from a chat reply. Handles markdown code
/// fences and prose-wrapped arrays.
fn parse_verdicts(raw: &str) -> Vec<RawVerdict> {
    let mut text = raw.trim();

    if text.starts_with("```") {
        text = text
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
    }

    if let Ok(verdicts) = serde_json::from_str::<Vec<RawVerdict>>(text) {
        return verdicts;
    }

    // Fallback: the array may be embedded in prose.
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            if let Ok(verdicts) = serde_json::from_str::<Vec<RawVerdict>>(&text[start..=end]) {
                return verdicts;
            }
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_array() {
        let raw = r#"[{"idx": 1, "score": 0.8, "label": "Positive", "confidence": 0.9, "reasoning": "tăng mạnh"}]"#;
        let verdicts = parse_verdicts(raw);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].idx, 1);
        assert!((verdicts[0].score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn parses_fenced_array() {
        let raw = "```json\n[{\"idx\": 2, \"score\": -0.4, \"label\": \"Negative\", \"confidence\": 0.7, \"reasoning\": \"\"}]\n```";
        let verdicts = parse_verdicts(raw);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].idx, 2);
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let raw = "Kết quả đánh giá:\n[{\"idx\": 1, \"score\": 0.0, \"label\": \"Neutral\", \"confidence\": 0.6, \"reasoning\": \"trung lập\"}]\nHết.";
        let verdicts = parse_verdicts(raw);
        assert_eq!(verdicts.len(), 1);
    }

    #[test]
    fn unparseable_reply_yields_nothing() {
        assert!(parse_verdicts("xin lỗi, tôi không thể đánh giá").is_empty());
    }

    #[test]
    fn unknown_label_text_falls_back_to_score() {
        assert_eq!(verdict_label("tích cực", 0.5), SentimentLabel::Bullish);
        assert_eq!(verdict_label("Neutral", 0.9), SentimentLabel::Neutral);
        assert_eq!(verdict_label("Negative", -0.5), SentimentLabel::Bearish);
    }

    #[test]
    fn batch_prompt_numbers_titles() {
        let prompt = OpenAiAnnotator::batch_prompt(&["VNM tăng mạnh", "HPG giảm sâu"]);
        assert!(prompt.contains("1. VNM tăng mạnh"));
        assert!(prompt.contains("2. HPG giảm sâu"));
        assert!(prompt.contains("2 tiêu đề"));
    }
}
