//! Legacy item-level index: a minimal tantivy index over whole items, kept
//! under `<index_dir>/items/` alongside the chunk index. Only ever consulted
//! by the fallback search path; its schema is intentionally small — it
//! exists to answer "does this item contain the query" when the chunk index
//! can't.

use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

pub struct LegacyItemIndex {
    index: Index,
    writer: IndexWriter,
    reader: IndexReader,
    f_item_id: tantivy::schema::Field,
    f_title: tantivy::schema::Field,
    f_content: tantivy::schema::Field,
}

impl LegacyItemIndex {
    pub fn open_or_create(index_dir: &Path) -> anyhow::Result<Self> {
        let items_dir = index_dir.join("items");
        std::fs::create_dir_all(&items_dir)?;

        let mut builder = Schema::builder();
        let f_item_id = builder.add_text_field("item_id", STRING | STORED);
        let f_title = builder.add_text_field("title", TEXT | STORED);
        let f_content = builder.add_text_field("content", TEXT | STORED);
        let schema = builder.build();

        let dir = tantivy::directory::MmapDirectory::open(&items_dir)?;
        let index = Index::open_or_create(dir, schema)?;
        let writer = index.writer(30_000_000)?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::OnCommitWithDelay).try_into()?;

        Ok(Self { index, writer, reader, f_item_id, f_title, f_content })
    }

    pub fn upsert(&mut self, item_id: &str, title: &str, content: &str) -> anyhow::Result<()> {
        self.writer.delete_term(Term::from_field_text(self.f_item_id, item_id));
        self.writer.add_document(doc!(
            self.f_item_id => item_id.to_string(),
            self.f_title => title.to_string(),
            self.f_content => content.to_string(),
        ))?;
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn remove(&mut self, item_id: &str) -> anyhow::Result<()> {
        self.writer.delete_term(Term::from_field_text(self.f_item_id, item_id));
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>> {
        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.f_title, self.f_content]);
        let parsed = query_parser.parse_query(query)?;
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
        let mut ids = Vec::with_capacity(top_docs.len());
        for (_, addr) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(addr)?;
            if let Some(id) = retrieved.get_first(self.f_item_id).and_then(|v| v.as_str()) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}
