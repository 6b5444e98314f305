//! Persistent chunk-level inverted index, tantivy-backed. Lives under
//! `<index_dir>/chunks/`; a sibling `<index_dir>/items/` holds the legacy
//! item-level fallback index.
//!
//! Schema-first `Index`, a single long-lived `IndexWriter`, a `QueryParser`
//! across the tokenized fields, `TopDocs` for ranking.

use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema, Value, FAST, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::core::model::Chunk;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub item_id: String,
    pub chunk_index: usize,
    pub heading: String,
    pub score: f32,
}

pub struct InvertedIndex {
    index: Index,
    writer: IndexWriter,
    reader: IndexReader,
    f_chunk_id: tantivy::schema::Field,
    f_item_id: tantivy::schema::Field,
    f_chunk_index: tantivy::schema::Field,
    f_heading: tantivy::schema::Field,
    f_content: tantivy::schema::Field,
}

fn build_schema() -> (Schema, tantivy::schema::Field, tantivy::schema::Field, tantivy::schema::Field, tantivy::schema::Field, tantivy::schema::Field) {
    let mut builder = Schema::builder();
    let f_chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
    let f_item_id = builder.add_text_field("item_id", STRING | STORED);
    let f_chunk_index = builder.add_u64_field("chunk_index", FAST | STORED);
    let f_heading = builder.add_text_field("heading", TEXT | STORED);
    let f_content = builder.add_text_field("content", TEXT | STORED);
    (builder.build(), f_chunk_id, f_item_id, f_chunk_index, f_heading, f_content)
}

impl InvertedIndex {
    /// Opens the chunk index directory, creating it if absent. A corrupted
    /// directory is demoted to "absent" by the caller via `hasChunkIndex`
    /// rather than surfaced here — open failures that are not "simply
    /// missing" propagate as `anyhow` so the caller can fall back.
    pub fn open_or_create(index_dir: &Path) -> anyhow::Result<Self> {
        let chunks_dir = index_dir.join("chunks");
        std::fs::create_dir_all(&chunks_dir)?;

        let (schema, f_chunk_id, f_item_id, f_chunk_index, f_heading, f_content) = build_schema();
        let dir = tantivy::directory::MmapDirectory::open(&chunks_dir)?;
        let index = Index::open_or_create(dir, schema)?;
        let writer = index.writer(50_000_000)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        Ok(Self {
            index,
            writer,
            reader,
            f_chunk_id,
            f_item_id,
            f_chunk_index,
            f_heading,
            f_content,
        })
    }

    pub fn add_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<()> {
        self.add_chunks(std::slice::from_ref(chunk))
    }

    pub fn add_chunks(&mut self, chunks: &[Chunk]) -> anyhow::Result<()> {
        for chunk in chunks {
            let term = Term::from_field_text(self.f_chunk_id, &chunk.id);
            self.writer.delete_term(term);
            self.writer.add_document(doc!(
                self.f_chunk_id => chunk.id.clone(),
                self.f_item_id => chunk.item_id.clone(),
                self.f_chunk_index => chunk.chunk_index as u64,
                self.f_heading => chunk.heading.clone(),
                self.f_content => chunk.content.clone(),
            ))?;
        }
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn remove_chunks_for_item(&mut self, item_id: &str) -> anyhow::Result<()> {
        let term = Term::from_field_text(self.f_item_id, item_id);
        self.writer.delete_term(term);
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn rebuild_chunk_index(&mut self, chunks: &[Chunk]) -> anyhow::Result<()> {
        self.writer.delete_all_documents()?;
        self.writer.commit()?;
        self.add_chunks(chunks)
    }

    pub fn has_chunk_index(&self) -> bool {
        let searcher = self.reader.searcher();
        searcher.num_docs() > 0
    }

    /// Default `limit = 50`.
    pub fn search_chunks(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ChunkHit>> {
        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.f_heading, self.f_content]);
        let parsed = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(_) => {
                let escaped: String = query.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();
                query_parser.parse_query(&escaped)?
            }
        };
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(addr)?;
            let chunk_id = retrieved
                .get_first(self.f_chunk_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let item_id = retrieved
                .get_first(self.f_item_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let chunk_index = retrieved
                .get_first(self.f_chunk_index)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            let heading = retrieved
                .get_first(self.f_heading)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            hits.push(ChunkHit {
                chunk_id,
                item_id,
                chunk_index,
                heading,
                score,
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Chunk;

    fn sample_chunk(item_id: &str, idx: usize, heading: &str, content: &str) -> Chunk {
        Chunk::new(item_id.to_string(), idx, content.to_string(), heading.to_string(), 0, content.len())
    }

    #[test]
    fn add_and_search_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InvertedIndex::open_or_create(dir.path()).unwrap();
        let chunk = sample_chunk("item-1", 0, "Intro", "this is a test of the search engine");
        index.add_chunks(&[chunk.clone()]).unwrap();

        assert!(index.has_chunk_index());
        let hits = index.search_chunks("test", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, chunk.id);
    }

    #[test]
    fn remove_chunks_for_item_drops_all_its_docs() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InvertedIndex::open_or_create(dir.path()).unwrap();
        index
            .add_chunks(&[
                sample_chunk("item-1", 0, "", "alpha beta gamma"),
                sample_chunk("item-1", 1, "", "delta epsilon"),
                sample_chunk("item-2", 0, "", "alpha again"),
            ])
            .unwrap();

        index.remove_chunks_for_item("item-1").unwrap();
        let hits = index.search_chunks("alpha", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item_id, "item-2");
    }

    #[test]
    fn empty_index_has_no_chunk_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = InvertedIndex::open_or_create(dir.path()).unwrap();
        assert!(!index.has_chunk_index());
    }

    /// S2 — heading-aware split: searching "body" should rank the chunk
    /// whose heading and content both mention it above the one that doesn't.
    #[test]
    fn s2_heading_match_outranks_content_only_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InvertedIndex::open_or_create(dir.path()).unwrap();
        index
            .add_chunks(&[
                sample_chunk("doc", 0, "Intro", "Para one."),
                sample_chunk("doc", 1, "Body", "Para two body."),
            ])
            .unwrap();

        let hits = index.search_chunks("body", 10).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].chunk_index, 1, "heading+content match should rank above content-only");
    }
}
