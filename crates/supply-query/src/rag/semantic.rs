//! Retrieval-augmented answers for open-ended questions about the supply log.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::llm::{GenerationConfig, LLMProvider};
use crate::search::RecordIndex;

pub const NO_DOCUMENTS: &str = "No relevant documents found in semantic search.";
pub const DEFAULT_TOP_K: usize = 5;

/// Ranked document retrieval. Scores are higher-is-better.
pub trait SemanticIndex: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>>;
}

impl SemanticIndex for RecordIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
        RecordIndex::search(self, query, k)
    }
}

fn build_answer_prompt(query: &str, documents: &[String]) -> String {
    format!(
        "You are an intelligent hospital supply assistant.\n\
         Using the below data, answer the user's question accurately and clearly.\n\n\
         Data:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        documents.join("\n"),
        query
    )
}

pub struct SemanticAnswerer {
    index: Arc<dyn SemanticIndex>,
    llm: Arc<dyn LLMProvider>,
    config: GenerationConfig,
    top_k: usize,
}

impl SemanticAnswerer {
    pub fn new(index: Arc<dyn SemanticIndex>, llm: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self {
            index,
            llm,
            config,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn answer(&self, query: &str) -> Result<String> {
        let hits = self
            .index
            .search(query, self.top_k)
            .context("Semantic search failed")?;
        if hits.is_empty() {
            return Ok(NO_DOCUMENTS.to_string());
        }

        tracing::debug!(documents = hits.len(), top_score = hits[0].1, "Semantic context retrieved");
        let documents: Vec<String> = hits.into_iter().map(|(doc, _)| doc).collect();
        let prompt = build_answer_prompt(query, &documents);
        let answer = self
            .llm
            .generate(&prompt, &self.config)
            .await
            .context("Semantic answer generation failed")?;
        Ok(answer.trim().to_string())
    }
}
