//! Query orchestration: classify a question, then hand it to the structured
//! resolver, the existence checker or the semantic answerer.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AssistantConfig;
use crate::llm::{GenerationConfig, LLMProvider, ProviderInfo, SimpleExternalProvider};
use crate::query::{Answer, ExistenceAnswer, ExistenceChecker, StructuredResolver};
use crate::rag::{IntentClassifier, Route, SemanticAnswerer, SemanticIndex};
use crate::search::RecordIndex;
use crate::table::{append_pending_logs, CsvTableSource, TableSource};

pub const UNROUTABLE_MESSAGE: &str = "Unable to determine query type.";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Structured(Answer),
    Semantic(String),
    Existence(ExistenceAnswer),
    /// The classifier returned a label no path handles.
    Unroutable(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Structured(answer) => write!(f, "{}", answer),
            Reply::Semantic(text) => f.write_str(text),
            Reply::Existence(answer) => write!(f, "{}", answer),
            Reply::Unroutable(_) => f.write_str(UNROUTABLE_MESSAGE),
        }
    }
}

pub struct SupplyAssistant {
    table: Arc<dyn TableSource>,
    llm: Arc<dyn LLMProvider>,
    classifier: IntentClassifier,
    semantic: SemanticAnswerer,
    resolver: StructuredResolver,
    checker: ExistenceChecker,
}

impl SupplyAssistant {
    pub fn new(
        config: &AssistantConfig,
        table: Arc<dyn TableSource>,
        llm: Arc<dyn LLMProvider>,
        index: Arc<dyn SemanticIndex>,
    ) -> Self {
        let generation = GenerationConfig::from(&config.llm);
        Self {
            table,
            classifier: IntentClassifier::new(llm.clone(), config.routing.rule_fallback),
            semantic: SemanticAnswerer::new(index, llm.clone(), generation).with_top_k(config.search.top_k),
            resolver: StructuredResolver::new(config.matching.accept_above),
            checker: ExistenceChecker::new(config.matching.accept_above),
            llm,
        }
    }

    /// Wire the CSV table, the configured LLM endpoint and the on-disk record
    /// index. Pending logs are ingested and the index synced before returning.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let index = RecordIndex::open(&config.data.index_dir)
            .with_context(|| format!("Failed to open record index at {}", config.data.index_dir.display()))?;
        prepare_data(config, &index)?;

        let llm = SimpleExternalProvider::from_settings(&config.llm, config.api_key())
            .context("Failed to create LLM provider")?;
        let info = llm.info();
        tracing::info!(provider = %info.name, model = %info.model, endpoint = %info.endpoint, "LLM provider configured");
        Ok(Self::new(
            config,
            Arc::new(CsvTableSource::new(&config.data.csv_file)),
            Arc::new(llm),
            Arc::new(index),
        ))
    }

    pub fn provider_info(&self) -> ProviderInfo {
        self.llm.info()
    }

    /// Whether the model endpoint can be called. Remote providers need an API key.
    pub async fn llm_ready(&self) -> bool {
        self.llm.is_ready().await
    }

    pub async fn route(&self, query: &str) -> Result<Route> {
        self.classifier.classify(query).await
    }

    pub async fn answer(&self, query: &str) -> Result<Reply> {
        let route = self.route(query).await?;
        self.answer_routed(&route, query).await
    }

    /// Answer along an already chosen route. The table is loaded fresh for
    /// each structured or existence question.
    pub async fn answer_routed(&self, route: &Route, query: &str) -> Result<Reply> {
        let reply = match route {
            Route::Structured => {
                let table = self.table.load()?;
                Reply::Structured(self.resolver.answer(&table, query))
            }
            Route::HospitalCheck => {
                let table = self.table.load()?;
                Reply::Existence(self.checker.check(&table, query))
            }
            Route::Semantic => Reply::Semantic(self.semantic.answer(query).await?),
            Route::Unroutable(label) => {
                tracing::warn!(label = %label, "Unroutable query type");
                Reply::Unroutable(label.clone())
            }
        };
        Ok(reply)
    }
}

/// Append pending logs to the supply log, then index any new records.
/// Returns the number of newly indexed records.
pub fn prepare_data(config: &AssistantConfig, index: &RecordIndex) -> Result<usize> {
    append_pending_logs(&config.data.csv_file, &config.data.pending_file)?;
    let table = CsvTableSource::new(&config.data.csv_file).load()?;
    index.sync(&table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use crate::table::fixtures::sample_table;
    use crate::table::{SupplyTable, TableResult};
    use std::io::Write;

    struct StaticTable(SupplyTable);

    impl TableSource for StaticTable {
        fn load(&self) -> TableResult<SupplyTable> {
            Ok(self.0.clone())
        }
    }

    fn assistant(reply: &str) -> SupplyAssistant {
        let index = RecordIndex::in_memory().unwrap();
        index.sync(&sample_table()).unwrap();
        SupplyAssistant::new(
            &AssistantConfig::default(),
            Arc::new(StaticTable(sample_table())),
            Arc::new(MockProvider::replying(reply)),
            Arc::new(index),
        )
    }

    #[tokio::test]
    async fn test_provider_info_and_readiness() {
        let ready = assistant("structured");
        assert_eq!(ready.provider_info().name, "Mock");
        assert!(ready.llm_ready().await);

        let not_ready = SupplyAssistant::new(
            &AssistantConfig::default(),
            Arc::new(StaticTable(sample_table())),
            Arc::new(MockProvider::failing()),
            Arc::new(RecordIndex::in_memory().unwrap()),
        );
        assert!(!not_ready.llm_ready().await);
    }

    #[tokio::test]
    async fn test_structured_route() {
        let reply = assistant("structured").answer("supplies in Sunshine Hsptal").await.unwrap();
        match reply {
            Reply::Structured(Answer::Rows(rows)) => assert_eq!(rows.len(), 2),
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_existence_route() {
        let reply = assistant("hospital_check")
            .answer("Is there a hospital named Apollo?")
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Existence(ExistenceAnswer::Found { .. })));
    }

    #[tokio::test]
    async fn test_semantic_route_returns_model_text() {
        let reply = assistant("semantic").answer("which hospital uses oxygen tanks").await.unwrap();
        assert_eq!(reply, Reply::Semantic("semantic".into()));
    }

    #[tokio::test]
    async fn test_unroutable_label() {
        let reply = assistant("I am not sure").answer("hello").await.unwrap();
        assert_eq!(reply, Reply::Unroutable("I am not sure".into()));
        assert_eq!(reply.to_string(), UNROUTABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_table_error_fails_the_turn() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = SupplyAssistant::new(
            &AssistantConfig::default(),
            Arc::new(CsvTableSource::new(dir.path().join("missing.csv"))),
            Arc::new(MockProvider::replying("structured")),
            Arc::new(RecordIndex::in_memory().unwrap()),
        );
        assert!(assistant.answer("supplies in City Hospital").await.is_err());
        let reply = assistant
            .answer_routed(&Route::Unroutable("x".into()), "q")
            .await
            .unwrap();
        assert_eq!(reply, Reply::Unroutable("x".into()));
    }

    #[test]
    fn test_prepare_data_ingests_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AssistantConfig::default();
        config.data.csv_file = dir.path().join("supply_log.csv");
        config.data.pending_file = dir.path().join("pending.csv");
        config.data.index_dir = dir.path().join("index");

        std::fs::write(
            &config.data.csv_file,
            "hospital_name,supply_name,supplier_name,quantity_supplied,weekly_wastage,severity,people_per_week\n\
             City Hospital,Gloves,MedSupply Inc.,120,5,high,300\n",
        )
        .unwrap();
        let mut pending = std::fs::File::create(&config.data.pending_file).unwrap();
        writeln!(pending, "Syringes,Global Med,80,Riverside Hospital,2,low,150").unwrap();
        drop(pending);

        let index = RecordIndex::open(&config.data.index_dir).unwrap();
        assert_eq!(prepare_data(&config, &index).unwrap(), 2);
        assert_eq!(prepare_data(&config, &index).unwrap(), 0);
        assert_eq!(std::fs::metadata(&config.data.pending_file).unwrap().len(), 0);

        let table = CsvTableSource::new(&config.data.csv_file).load().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].hospital_name, "Riverside Hospital");
    }
}
