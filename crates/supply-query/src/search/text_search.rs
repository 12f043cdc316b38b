use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, Value as TantivyValue, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::matching::normalize;
use crate::table::SupplyTable;

/// Full-text index over supply record documents, keyed by hashcode.
pub struct RecordIndex {
    index: Index,
    reader: IndexReader,
    writer: parking_lot::Mutex<IndexWriter>,
    hashcode_field: schema::Field,
    content_field: schema::Field,
}

impl RecordIndex {
    /// `hashcode` must be STRING (indexed, not tokenized) so term lookups work.
    fn build_schema() -> (Schema, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let hashcode_field = sb.add_text_field("hashcode", STRING | STORED);
        let content_field = sb.add_text_field("content", TEXT | STORED);
        (sb.build(), hashcode_field, content_field)
    }

    /// Open the index under `path`, creating it on first use.
    pub fn open(path: &Path) -> Result<Self> {
        let index_path = path.join("tantivy_index");
        std::fs::create_dir_all(&index_path)
            .with_context(|| format!("Failed to create index directory {}", index_path.display()))?;

        let (schema, _, _) = Self::build_schema();
        let dir = tantivy::directory::MmapDirectory::open(&index_path)?;
        let index = if Index::exists(&dir)? {
            Index::open_in_dir(&index_path)?
        } else {
            tracing::info!(path = %index_path.display(), "Creating record index");
            Index::create_in_dir(&index_path, schema)?
        };
        Self::from_index(index)
    }

    pub fn in_memory() -> Result<Self> {
        let (schema, _, _) = Self::build_schema();
        Self::from_index(Index::create_in_ram(schema))
    }

    fn from_index(index: Index) -> Result<Self> {
        let schema = index.schema();
        let hashcode_field = schema
            .get_field("hashcode")
            .context("Record index has no hashcode field")?;
        let content_field = schema
            .get_field("content")
            .context("Record index has no content field")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create Tantivy reader")?;

        let writer = index
            .writer_with_num_threads(1, 50_000_000)
            .context("Failed to create Tantivy writer")?;

        Ok(Self {
            index,
            reader,
            writer: parking_lot::Mutex::new(writer),
            hashcode_field,
            content_field,
        })
    }

    /// Hashcodes of every live document.
    pub fn indexed_hashcodes(&self) -> Result<HashSet<String>> {
        let searcher = self.reader.searcher();
        let mut ids = HashSet::new();
        for segment_reader in searcher.segment_readers() {
            let store_reader = segment_reader.get_store_reader(64)?;
            for doc_id in 0..segment_reader.max_doc() {
                if segment_reader.is_deleted(doc_id) {
                    continue;
                }
                let doc = store_reader.get::<TantivyDocument>(doc_id)?;
                if let Some(id) = doc.get_first(self.hashcode_field).and_then(|v| v.as_str()) {
                    ids.insert(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Add every record whose hashcode is not indexed yet. Returns how many were added.
    pub fn sync(&self, table: &SupplyTable) -> Result<usize> {
        let mut seen = self.indexed_hashcodes()?;
        let mut added = 0usize;
        {
            let writer = self.writer.lock();
            for record in table.records() {
                let hashcode = if record.hashcode.is_empty() {
                    record.compute_hashcode()
                } else {
                    record.hashcode.clone()
                };
                if !seen.insert(hashcode.clone()) {
                    continue;
                }
                writer.add_document(doc!(
                    self.hashcode_field => hashcode,
                    self.content_field => record.content(),
                ))?;
                added += 1;
            }
        }

        if added > 0 {
            self.commit()?;
        }
        tracing::info!(added, total = seen.len(), "Record index synced");
        Ok(added)
    }

    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().context("Tantivy commit failed")?;
        self.reader.reload()?;
        Ok(())
    }

    /// Top `k` record documents for a free-text query, best first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let cleaned = normalize(query);
        if cleaned.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let parsed_query = match query_parser.parse_query(&cleaned) {
            Ok(q) => q,
            Err(_) => query_parser.parse_query(&format!("\"{}\"", cleaned))?,
        };

        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(k))?;
        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            if let Some(text) = doc.get_first(self.content_field).and_then(|v| v.as_str()) {
                results.push((text.to_string(), score));
            }
        }
        Ok(results)
    }

    pub fn count(&self) -> Result<usize> {
        let searcher = self.reader.searcher();
        Ok(searcher.num_docs() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.count().unwrap_or(0) == 0
    }
}
