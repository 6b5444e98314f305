//! Durable relational store: items, chunks, categories, tags, relationships,
//! behind a single mutex-guarded `rusqlite::Connection` — single-writer.
//! Foreign-key enforcement is turned on at every open, since it's a silent
//! data-integrity hazard if forgotten, and asserted by a dedicated test below.

mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::{CoreError, CoreResult};
use crate::core::model::{Chunk, Item, Metadata, SourceType};

pub struct Store {
    conn: Mutex<Connection>,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct StoreStats {
    pub items: i64,
    pub chunks: i64,
    pub categories: i64,
    pub tags: i64,
    pub relationships: i64,
}

#[derive(Default)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Store {
    pub fn open(path: &Path) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn save_item(&self, item: &Item) -> CoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO items (id, title, content, source_type, source_path, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.id,
                item.title,
                item.content,
                item.source_type.as_str(),
                item.source_path,
                serde_json::to_string(&item.metadata).unwrap_or_else(|_| "{}".into()),
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Updates title/content and bumps `updated_at`; returns `false` if the
    /// item does not exist (not surfaced as an error here).
    pub fn update_item(&self, id: &str, title: &str, content: &str) -> CoreResult<bool> {
        let conn = self.lock();
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            "UPDATE items SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
            params![title, content, now, id],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_item(&self, id: &str) -> CoreResult<bool> {
        let conn = self.lock();
        let affected = conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn get_item(&self, id: &str) -> CoreResult<Option<Item>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, title, content, source_type, source_path, metadata, created_at, updated_at
                 FROM items WHERE id = ?1",
                params![id],
                Self::row_to_item,
            )
            .optional()?;
        Ok(row)
    }

    /// Atomic delete-then-insert: no differential diffing.
    pub fn save_chunks(&self, item_id: &str, chunks: &[Chunk]) -> CoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE item_id = ?1", params![item_id])?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (id, item_id, chunk_index, content, heading, start_position, end_position, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    chunk.id,
                    item_id,
                    chunk.chunk_index as i64,
                    chunk.content,
                    chunk.heading,
                    chunk.start_position as i64,
                    chunk.end_position as i64,
                    serde_json::to_string(&chunk.metadata).unwrap_or_else(|_| "{}".into()),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_chunks_for_item(&self, item_id: &str) -> CoreResult<Vec<Chunk>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, item_id, chunk_index, content, heading, start_position, end_position, metadata
             FROM chunks WHERE item_id = ?1 ORDER BY chunk_index ASC",
        )?;
        let rows = stmt
            .query_map(params![item_id], Self::row_to_chunk)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_chunk_by_id(&self, chunk_id: &str) -> CoreResult<Option<Chunk>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, item_id, chunk_index, content, heading, start_position, end_position, metadata
                 FROM chunks WHERE id = ?1",
                params![chunk_id],
                Self::row_to_chunk,
            )
            .optional()?;
        Ok(row)
    }

    /// Returns chunks at `chunk_index - 1` and `chunk_index + 1`, when present.
    pub fn get_adjacent_chunks(&self, item_id: &str, chunk_index: usize) -> CoreResult<Vec<Chunk>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, item_id, chunk_index, content, heading, start_position, end_position, metadata
             FROM chunks WHERE item_id = ?1 AND chunk_index IN (?2, ?3) ORDER BY chunk_index ASC",
        )?;
        let lo = chunk_index as i64 - 1;
        let hi = chunk_index as i64 + 1;
        let rows = stmt
            .query_map(params![item_id, lo, hi], Self::row_to_chunk)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn query_items(&self, query: &ItemQuery) -> CoreResult<Vec<Item>> {
        if query.limit < 0 || query.offset < 0 {
            return Err(CoreError::InvalidArgument("limit/offset must be non-negative".into()));
        }
        let conn = self.lock();
        let mut sql = String::from(
            "SELECT DISTINCT i.id, i.title, i.content, i.source_type, i.source_path, i.metadata, i.created_at, i.updated_at
             FROM items i",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<String> = Vec::new();

        if let Some(cat) = &query.category {
            sql.push_str(" JOIN item_categories ic ON ic.item_id = i.id JOIN categories c ON c.id = ic.category_id");
            clauses.push("c.name = ?".into());
            bind.push(cat.clone());
        }
        if let Some(tag) = &query.tag {
            sql.push_str(" JOIN item_tags it ON it.item_id = i.id JOIN tags t ON t.id = it.tag_id");
            clauses.push("t.name = ?".into());
            bind.push(tag.clone());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY i.updated_at DESC LIMIT ? OFFSET ?");

        let mut stmt = conn.prepare(&sql)?;
        let mut param_values: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        param_values.push(&query.limit);
        param_values.push(&query.offset);

        let rows = stmt
            .query_map(param_values.as_slice(), Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Items + category map + tag map in exactly 3 statements; no per-item loop queries.
    pub fn get_all_items_eager(&self) -> CoreResult<Vec<(Item, Vec<String>, Vec<String>)>> {
        let conn = self.lock();

        let mut items_stmt = conn.prepare(
            "SELECT id, title, content, source_type, source_path, metadata, created_at, updated_at FROM items",
        )?;
        let items: Vec<Item> = items_stmt
            .query_map([], Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut cat_stmt = conn.prepare(
            "SELECT ic.item_id, c.name FROM item_categories ic JOIN categories c ON c.id = ic.category_id",
        )?;
        let mut category_map: HashMap<String, Vec<String>> = HashMap::new();
        for row in cat_stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (item_id, name) = row?;
            category_map.entry(item_id).or_default().push(name);
        }

        let mut tag_stmt = conn.prepare("SELECT it.item_id, t.name FROM item_tags it JOIN tags t ON t.id = it.tag_id")?;
        let mut tag_map: HashMap<String, Vec<String>> = HashMap::new();
        for row in tag_stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (item_id, name) = row?;
            tag_map.entry(item_id).or_default().push(name);
        }

        Ok(items
            .into_iter()
            .map(|item| {
                let cats = category_map.get(&item.id).cloned().unwrap_or_default();
                let tags = tag_map.get(&item.id).cloned().unwrap_or_default();
                (item, cats, tags)
            })
            .collect())
    }

    pub fn stats(&self) -> CoreResult<StoreStats> {
        let conn = self.lock();
        let count = |table: &str| -> rusqlite::Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        };
        Ok(StoreStats {
            items: count("items")?,
            chunks: count("chunks")?,
            categories: count("categories")?,
            tags: count("tags")?,
            relationships: count("relationships")?,
        })
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let source_type_str: String = row.get(3)?;
        let metadata_str: String = row.get(5)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;
        Ok(Item {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            source_type: SourceType::parse(&source_type_str).unwrap_or(SourceType::Document),
            source_path: row.get(4)?,
            metadata: serde_json::from_str::<Metadata>(&metadata_str).unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
        let metadata_str: String = row.get(7)?;
        Ok(Chunk {
            id: row.get(0)?,
            item_id: row.get(1)?,
            chunk_index: row.get::<_, i64>(2)? as usize,
            content: row.get(3)?,
            heading: row.get(4)?,
            start_position: row.get::<_, i64>(5)? as usize,
            end_position: row.get::<_, i64>(6)? as usize,
            metadata: serde_json::from_str::<Metadata>(&metadata_str).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SourceType;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let (store, _dir) = temp_store();
        let conn = store.lock();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1, "foreign_keys must be ON at every connection open");
    }

    #[test]
    fn delete_item_cascades_chunks() {
        let (store, _dir) = temp_store();
        let item = Item::new("Title".into(), "Content".into(), SourceType::Document);
        store.save_item(&item).unwrap();
        let chunk = Chunk::new(item.id.clone(), 0, "Content".into(), "".into(), 0, 7);
        store.save_chunks(&item.id, &[chunk]).unwrap();
        assert_eq!(store.get_chunks_for_item(&item.id).unwrap().len(), 1);

        store.delete_item(&item.id).unwrap();
        assert!(store.get_chunks_for_item(&item.id).unwrap().is_empty());
    }

    #[test]
    fn save_chunks_is_delete_then_insert() {
        let (store, _dir) = temp_store();
        let item = Item::new("T".into(), "C".into(), SourceType::Document);
        store.save_item(&item).unwrap();
        let c1 = Chunk::new(item.id.clone(), 0, "one".into(), "".into(), 0, 3);
        store.save_chunks(&item.id, &[c1]).unwrap();
        let c2 = Chunk::new(item.id.clone(), 0, "two".into(), "".into(), 0, 3);
        store.save_chunks(&item.id, &[c2]).unwrap();
        let chunks = store.get_chunks_for_item(&item.id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "two");
    }

    #[test]
    fn adjacent_chunks_returns_bounded_set() {
        let (store, _dir) = temp_store();
        let item = Item::new("T".into(), "C".into(), SourceType::Document);
        store.save_item(&item).unwrap();
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| Chunk::new(item.id.clone(), i, format!("chunk {i}"), "".into(), i * 10, i * 10 + 5))
            .collect();
        store.save_chunks(&item.id, &chunks).unwrap();

        let adj = store.get_adjacent_chunks(&item.id, 2).unwrap();
        assert_eq!(adj.len(), 2);
        assert_eq!(adj[0].chunk_index, 1);
        assert_eq!(adj[1].chunk_index, 3);

        let adj_edge = store.get_adjacent_chunks(&item.id, 0).unwrap();
        assert_eq!(adj_edge.len(), 1);
        assert_eq!(adj_edge[0].chunk_index, 1);
    }
}
