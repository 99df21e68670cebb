//! Optional generative-text enhancement of mentorship reports.
//!
//! The deterministic report is always valid on its own. An enhancer may
//! rewrite it, and any failure falls back to the original text.

use serde::{Deserialize, Serialize};

use crate::config::{EnhancerConfig, HfConfig};
use crate::error::{AnalyticsError, Result};

pub trait InsightEnhancer: Send + Sync {
    fn enhance(&self, insight: &str) -> Result<String>;
}

/// Wraps a structured insight in mentor instructions.
pub fn build_prompt(insight: &str) -> String {
    format!(
        "You are a top-tier academic mentor.\n\n\
         Improve clarity and usefulness of this academic insight.\n\
         Do NOT invent marks or change the meaning.\n\
         Be concise, professional, and actionable.\n\n\
         Insight:\n{insight}\n"
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedInsight {
    pub text: String,
    pub enhanced: bool,
}

/// Runs the enhancer and returns the deterministic insight unchanged if it fails.
pub fn enhance_or_fallback(enhancer: &dyn InsightEnhancer, insight: &str) -> EnhancedInsight {
    match enhancer.enhance(insight) {
        Ok(text) if !text.trim().is_empty() => EnhancedInsight {
            text,
            enhanced: true,
        },
        Ok(_) => {
            tracing::warn!("enhancer returned empty text, using local insight");
            EnhancedInsight {
                text: insight.to_string(),
                enhanced: false,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "enhancer unavailable, using local insight");
            EnhancedInsight {
                text: insight.to_string(),
                enhanced: false,
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for an Ollama-style `/api/generate` endpoint.
pub struct OllamaEnhancer {
    config: EnhancerConfig,
    client: reqwest::blocking::Client,
}

impl OllamaEnhancer {
    pub fn new(config: EnhancerConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("student_success/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(client_error)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }
}

impl InsightEnhancer for OllamaEnhancer {
    fn enhance(&self, insight: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: build_prompt(insight),
            stream: false,
        };

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .map_err(|e| AnalyticsError::ServiceUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalyticsError::ServiceUnavailable(format!("{status}: {body}")));
        }

        let body: GenerateResponse = response.json().map_err(invalid_body)?;
        Ok(body.response.trim().to_string())
    }
}

fn client_error(e: reqwest::Error) -> AnalyticsError {
    AnalyticsError::ServiceUnavailable(format!("failed to create HTTP client: {e}"))
}

fn invalid_body(e: reqwest::Error) -> AnalyticsError {
    AnalyticsError::ServiceUnavailable(format!("invalid response body: {e}"))
}

#[derive(Debug, Serialize)]
struct HfRequest {
    inputs: String,
    parameters: HfParameters,
}

#[derive(Debug, Serialize)]
struct HfParameters {
    max_new_tokens: u32,
    temperature: f64,
}

/// Client for the Hugging Face text-generation inference API.
pub struct HfEnhancer {
    config: HfConfig,
    client: reqwest::blocking::Client,
}

impl HfEnhancer {
    pub fn new(config: HfConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("student_success/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(client_error)?;
        Ok(Self { config, client })
    }
}

impl InsightEnhancer for HfEnhancer {
    fn enhance(&self, insight: &str) -> Result<String> {
        let request = HfRequest {
            inputs: build_prompt(insight),
            parameters: HfParameters {
                max_new_tokens: self.config.max_new_tokens,
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .map_err(|e| AnalyticsError::ServiceUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalyticsError::ServiceUnavailable(format!("{status}: {body}")));
        }

        let body: serde_json::Value = response.json().map_err(invalid_body)?;
        Ok(generated_text(&body))
    }
}

/// Pulls `generated_text` out of `[{"generated_text": ...}]`, otherwise returns the raw JSON.
fn generated_text(body: &serde_json::Value) -> String {
    match body.get(0).and_then(|first| first.get("generated_text")) {
        Some(serde_json::Value::String(text)) => text.trim().to_string(),
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl InsightEnhancer for Failing {
        fn enhance(&self, _insight: &str) -> Result<String> {
            Err(AnalyticsError::ServiceUnavailable("quota exceeded".into()))
        }
    }

    struct Shouting;

    impl InsightEnhancer for Shouting {
        fn enhance(&self, insight: &str) -> Result<String> {
            Ok(insight.to_uppercase())
        }
    }

    struct Blank;

    impl InsightEnhancer for Blank {
        fn enhance(&self, _insight: &str) -> Result<String> {
            Ok("   ".to_string())
        }
    }

    #[test]
    fn failure_returns_local_insight_verbatim() {
        let insight = "Academic Risk Level: Not Available";
        let result = enhance_or_fallback(&Failing, insight);
        assert_eq!(result.text, insight);
        assert!(!result.enhanced);
    }

    #[test]
    fn success_uses_enhanced_text() {
        let result = enhance_or_fallback(&Shouting, "keep going");
        assert_eq!(result.text, "KEEP GOING");
        assert!(result.enhanced);
    }

    #[test]
    fn blank_response_falls_back() {
        let result = enhance_or_fallback(&Blank, "keep going");
        assert_eq!(result.text, "keep going");
        assert!(!result.enhanced);
    }

    #[test]
    fn prompt_embeds_insight_and_guardrail() {
        let prompt = build_prompt("Priority focus subjects:");
        assert!(prompt.contains("Do NOT invent marks"));
        assert!(prompt.ends_with("Insight:\nPriority focus subjects:\n"));
    }

    #[test]
    fn unreachable_server_is_service_unavailable() {
        let enhancer = OllamaEnhancer::new(EnhancerConfig {
            url: "http://127.0.0.1:9/api/generate".to_string(),
            model: "test".to_string(),
            timeout: std::time::Duration::from_millis(200),
        })
        .unwrap();
        let err = enhancer.enhance("hello").unwrap_err();
        assert!(matches!(err, AnalyticsError::ServiceUnavailable(_)));
    }

    #[test]
    fn hf_generated_text_is_extracted() {
        let body = serde_json::json!([{ "generated_text": "  Focus on SUB001 first.\n" }]);
        assert_eq!(generated_text(&body), "Focus on SUB001 first.");
    }

    #[test]
    fn hf_unexpected_body_is_returned_raw() {
        let body = serde_json::json!({ "error": "Model is loading" });
        assert_eq!(generated_text(&body), r#"{"error":"Model is loading"}"#);
        assert_eq!(generated_text(&serde_json::json!([])), "[]");
    }

    #[test]
    fn hf_unreachable_server_falls_back() {
        let enhancer = HfEnhancer::new(HfConfig {
            url: "http://127.0.0.1:9/models/test".to_string(),
            api_key: "hf_test".to_string(),
            max_new_tokens: 16,
            temperature: 0.3,
            timeout: std::time::Duration::from_millis(200),
        })
        .unwrap();
        let result = enhance_or_fallback(&enhancer, "keep going");
        assert_eq!(result.text, "keep going");
        assert!(!result.enhanced);
    }
}
