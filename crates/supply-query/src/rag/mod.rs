//! Query routing and retrieval-augmented answering.

pub mod llm_router;
pub mod semantic;

pub use llm_router::{rule_route, IntentClassifier, Route};
pub use semantic::{SemanticAnswerer, SemanticIndex, DEFAULT_TOP_K, NO_DOCUMENTS};
