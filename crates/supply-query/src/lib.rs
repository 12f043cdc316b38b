pub mod assistant;
pub mod config;
pub mod llm;
pub mod matching;
pub mod query;
pub mod rag;
pub mod search;
pub mod table;
pub mod types;

// Re-export primary types for convenience
pub use assistant::{prepare_data, Reply, SupplyAssistant};
pub use config::AssistantConfig;
pub use query::{answer_structured, Answer, ExistenceAnswer, ExistenceChecker, StructuredResolver};
pub use rag::Route;
pub use table::{CsvTableSource, SupplyTable, TableError, TableSource};
pub use types::{Entity, QueryConstraints, SupplyRecord};

// Re-export LLM types
pub use llm::{ApiProvider, GenerationConfig, LLMProvider, ProviderInfo, SimpleExternalProvider};

// Re-export common types
pub use anyhow::{Error, Result};
