//! LLM-Based Intent Router
//!
//! A single LLM call labels each query as structured, semantic or
//! hospital_check. Falls back to rule-based logic when the LLM is unavailable.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::{GenerationConfig, LLMProvider};
use crate::query::extract;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Structured,
    Semantic,
    HospitalCheck,
    /// Any label the router does not know, kept verbatim.
    Unroutable(String),
}

impl Route {
    /// Map a raw model reply to a route. Only exact labels are accepted.
    pub fn from_label(raw: &str) -> Route {
        match normalize_label(raw).as_str() {
            "structured" => Route::Structured,
            "semantic" => Route::Semantic,
            "hospital_check" => Route::HospitalCheck,
            _ => Route::Unroutable(raw.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Route::Structured => "structured",
            Route::Semantic => "semantic",
            Route::HospitalCheck => "hospital_check",
            Route::Unroutable(raw) => raw,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Router Prompt
// ---------------------------------------------------------------------------

const ROUTER_PROMPT: &str = r#"You are a smart agent that classifies hospital supply queries.

Decide the type:
- Respond with "structured" if the query asks for specific data from known fields like hospital name, supply name, quantity, wastage, severity, etc.
- Respond with "semantic" if the query is vague, comparative, or requires interpretation or summarization.
- Respond with "hospital_check" only if the query is asking whether a specific hospital exists or not (e.g. "Is there a hospital named Apollo?").

Return exactly one of: structured, semantic, hospital_check."#;

fn build_router_prompt(query: &str) -> String {
    format!("{}\n\nQuery: \"{}\"\n\nAnswer:", ROUTER_PROMPT, query)
}

/// Trim, lowercase, and strip quotes, backticks and a trailing period.
fn normalize_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim()
        .to_lowercase()
}

/// Keyword routing used when the model call fails.
pub fn rule_route(query: &str) -> Route {
    let q = query.to_lowercase();
    if q.contains("is there") || q.contains("exist") {
        return Route::HospitalCheck;
    }
    let constraints = extract(&q);
    if constraints.entry_count || constraints.hospital_details.is_some() || constraints.has_filters() {
        Route::Structured
    } else {
        Route::Semantic
    }
}

// ---------------------------------------------------------------------------
// Intent Classifier
// ---------------------------------------------------------------------------

pub struct IntentClassifier {
    llm: Arc<dyn LLMProvider>,
    config: GenerationConfig,
    rule_fallback: bool,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LLMProvider>, rule_fallback: bool) -> Self {
        Self {
            llm,
            config: GenerationConfig {
                max_tokens: 10,
                temperature: 0.0,
                ..GenerationConfig::default()
            },
            rule_fallback,
        }
    }

    /// Route a query using the LLM.
    ///
    /// Returns `Err` only when the model call fails and the rule fallback is off.
    pub async fn classify(&self, query: &str) -> Result<Route> {
        let prompt = build_router_prompt(query);
        let start = std::time::Instant::now();

        match self.llm.generate(&prompt, &self.config).await {
            Ok(raw) => {
                let route = Route::from_label(&raw);
                tracing::info!(
                    route = %route,
                    raw = %raw.trim(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "LLM router decision"
                );
                Ok(route)
            }
            Err(e) if self.rule_fallback => {
                let route = rule_route(query);
                tracing::warn!(error = %e, route = %route, "LLM router failed, using rule-based routing");
                Ok(route)
            }
            Err(e) => Err(e).context("LLM router call failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
