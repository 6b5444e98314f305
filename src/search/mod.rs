//! SearchCore: the orchestrator. A single `search()` entry point plus
//! the three index-maintenance hooks that keep store/inverted/vector in sync.
//!
//! A service-layer struct holding an `Arc<CoreContext>` with async methods
//! that acquire the locks they need and release them before returning.

pub mod aggregate;
pub mod budget;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::chunking::{extract_keywords, Chunker, ChunkingConfig};
use crate::core::context::CoreContext;
use crate::core::error::{CoreError, CoreResult};
use crate::core::model::{Chunk, Item};

use aggregate::{aggregate_phase2, merge_phase1, ItemAggregate};
use budget::*;

const ALPHA: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Relevance,
    Date,
    Title,
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::Relevance
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SearchOptions {
    pub max_results: Option<i64>,
    pub min_relevance: Option<f64>,
    #[serde(default)]
    pub include_categories: Vec<String>,
    #[serde(default)]
    pub include_tags: Vec<String>,
    #[serde(default)]
    pub include_source_types: Vec<String>,
    pub sort_by: Option<SortBy>,
    #[serde(default)]
    pub group_by_category: bool,
    #[serde(default)]
    pub include_highlights: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultChunk {
    pub chunk_id: String,
    pub content: String,
    pub heading: String,
    pub chunk_index: i64,
    pub start_position: usize,
    pub end_position: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_type: String,
    pub source_path: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultItemView {
    pub item: ItemView,
    pub relevance_score: f64,
    pub matched_fields: Vec<String>,
    pub highlights: Vec<String>,
    pub matched_chunks: Vec<ResultChunk>,
    pub context_chunks: Vec<ResultChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub results: Vec<ResultItemView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped_by_category: Option<IndexMap<String, Vec<ResultItemView>>>,
}

pub struct SearchCore {
    ctx: Arc<CoreContext>,
}

impl SearchCore {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    pub async fn search(&self, query: &str, options: SearchOptions) -> CoreResult<SearchResponse> {
        if let Some(max) = options.max_results {
            if max < 0 {
                return Err(CoreError::InvalidArgument("max_results must be non-negative".into()));
            }
        }

        let min_relevance = options.min_relevance.unwrap_or(self.ctx.config.min_relevance);
        let max_results = options.max_results.unwrap_or(self.ctx.config.max_results as i64).max(0) as usize;

        let has_chunk_index = {
            let idx = self.ctx.inverted_index.read().await;
            idx.has_chunk_index()
        };

        let mut items: Vec<ResultItemView>;

        if has_chunk_index {
            let scored = self.phase1(query).await?;
            if scored.is_empty() {
                items = self.fallback_search(query).await?;
            } else {
                let aggregates = {
                    let store = &self.ctx.store;
                    aggregate_phase2(scored, store).map_err(CoreError::Other)?
                };
                items = self.build_result_views(aggregates, query, options.include_highlights).await?;
            }
        } else {
            items = self.fallback_search(query).await?;
        }

        items.retain(|r| r.relevance_score >= min_relevance);
        self.apply_filters(&mut items, &options);
        self.sort_results(&mut items, options.sort_by.unwrap_or_default());
        items.truncate(max_results);

        let budgeted = apply_result_budget(items, &self.ctx.config);

        let grouped_by_category = if options.group_by_category {
            Some(self.group_by_category(budgeted.clone()))
        } else {
            None
        };

        Ok(SearchResponse {
            query: query.to_string(),
            total: budgeted.len(),
            results: budgeted,
            grouped_by_category,
        })
    }

    /// Phase 1: independent keyword + semantic chunk retrieval,
    /// merged by `chunk_id` with `α = 0.6` max-normalization.
    async fn phase1(&self, query: &str) -> CoreResult<Vec<aggregate::ScoredChunk>> {
        let keyword_hits = if self.ctx.config.enable_keyword {
            let idx = self.ctx.inverted_index.read().await;
            idx.search_chunks(query, 50).unwrap_or_else(|e| {
                tracing::warn!("inverted index search failed, treating as no hits: {e}");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let semantic_hits = if self.ctx.config.enable_semantic {
            let idx = self.ctx.vector_index.read().await;
            idx.search_chunks(query, 50, 0.05)
        } else {
            Vec::new()
        };

        Ok(merge_phase1(keyword_hits, semantic_hits, ALPHA))
    }

    async fn fallback_search(&self, query: &str) -> CoreResult<Vec<ResultItemView>> {
        let item_ids = {
            let idx = self.ctx.legacy_item_index.read().await;
            idx.search(query, 50).unwrap_or_else(|e| {
                tracing::warn!("legacy item index search failed: {e}");
                Vec::new()
            })
        };

        let lookup = self.categories_tags_lookup()?;
        let mut results = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let Some(item) = self.ctx.store.get_item(&item_id)? else {
                continue;
            };
            let matched_chunks = self.try_late_chunk(&item, query).await?;
            let view = self.item_to_view(&item, &lookup);
            let relevance_score = if matched_chunks.is_empty() { 0.1 } else { 1.0 };
            results.push(ResultItemView {
                item: view,
                relevance_score,
                matched_fields: vec!["content".to_string()],
                highlights: Vec::new(),
                matched_chunks,
                context_chunks: Vec::new(),
            });
        }
        Ok(results)
    }

    /// Late (on-demand) chunking, with snippet-extraction fallback.
    async fn try_late_chunk(&self, item: &Item, query: &str) -> CoreResult<Vec<ResultChunk>> {
        if item.content.len() <= LATE_CHUNK_THRESHOLD {
            return Ok(Vec::new());
        }

        let chunker = Chunker::new(ChunkingConfig::from(&self.ctx.config));
        let mut chunks = chunker.chunk(&item.content, &item.title);
        if chunks.is_empty() {
            return Ok(self.snippet_fallback(item, query));
        }
        for c in &mut chunks {
            c.item_id = item.id.clone();
        }

        if let Err(e) = self.ctx.store.save_chunks(&item.id, &chunks) {
            tracing::warn!("late chunking: failed to persist chunks for {}: {e}", item.id);
            return Ok(self.snippet_fallback(item, query));
        }
        {
            let mut idx = self.ctx.inverted_index.write().await;
            if let Err(e) = idx.add_chunks(&chunks) {
                tracing::warn!("late chunking: inverted index update failed: {e}");
            }
        }
        {
            let mut idx = self.ctx.vector_index.write().await;
            idx.update_chunks_for_item(&item.id, &chunks);
        }

        let tokens = extract_keywords(query);
        let matched: Vec<ResultChunk> = chunks
            .iter()
            .filter(|c| {
                let lower = c.content.to_lowercase();
                tokens.iter().any(|t| lower.contains(t.as_str()))
            })
            .take(MAX_MATCHED_CHUNKS)
            .map(|c| ResultChunk {
                chunk_id: c.id.clone(),
                content: c.content.clone(),
                heading: c.heading.clone(),
                chunk_index: c.chunk_index as i64,
                start_position: c.start_position,
                end_position: c.end_position,
                score: 1.0,
            })
            .collect();

        Ok(matched)
    }

    fn snippet_fallback(&self, item: &Item, query: &str) -> Vec<ResultChunk> {
        let tokens = extract_keywords(query);
        let lower_content = item.content.to_lowercase();
        let mut windows: Vec<(usize, usize)> = Vec::new();

        for token in &tokens {
            if let Some(pos) = lower_content.find(token.as_str()) {
                let start = pos.saturating_sub(SNIPPET_RADIUS);
                let end = (pos + token.len() + SNIPPET_RADIUS).min(item.content.len());
                if !windows.iter().any(|&(s, e)| s <= start && end <= e || (start <= s && s <= end)) {
                    windows.push((start, end));
                }
            }
        }

        windows
            .into_iter()
            .take(MAX_MATCHED_CHUNKS)
            .enumerate()
            .map(|(i, (start, end))| {
                let mut s = start;
                let mut e = end;
                while s < item.content.len() && !item.content.is_char_boundary(s) {
                    s += 1;
                }
                while e < item.content.len() && !item.content.is_char_boundary(e) {
                    e += 1;
                }
                let content = item.content.get(s..e).unwrap_or("").to_string();
                ResultChunk {
                    chunk_id: format!("{}-snippet-{}", item.id, i),
                    content,
                    heading: String::new(),
                    chunk_index: -1,
                    start_position: s,
                    end_position: e,
                    score: 1.0,
                }
            })
            .collect()
    }

    async fn build_result_views(
        &self,
        aggregates: Vec<ItemAggregate>,
        _query: &str,
        _include_highlights: bool,
    ) -> CoreResult<Vec<ResultItemView>> {
        let lookup = self.categories_tags_lookup()?;
        let mut out = Vec::with_capacity(aggregates.len());
        for agg in aggregates {
            let Some(item) = self.ctx.store.get_item(&agg.item_id)? else {
                continue;
            };
            let view = self.item_to_view(&item, &lookup);

            let mut matched_chunks = Vec::with_capacity(agg.matched_chunk_ids.len());
            for (chunk_id, score) in &agg.matched_chunk_ids {
                if let Some(c) = self.ctx.store.get_chunk_by_id(chunk_id)? {
                    matched_chunks.push(chunk_to_result(&c, *score));
                }
            }
            let mut context_chunks = Vec::with_capacity(agg.context_chunk_ids.len());
            for chunk_id in &agg.context_chunk_ids {
                if let Some(c) = self.ctx.store.get_chunk_by_id(chunk_id)? {
                    context_chunks.push(chunk_to_result(&c, 0.0));
                }
            }

            out.push(ResultItemView {
                item: view,
                relevance_score: agg.relevance_score,
                matched_fields: vec!["content".to_string()],
                highlights: Vec::new(),
                matched_chunks,
                context_chunks,
            });
        }
        Ok(out)
    }

    /// One eager items+category+tag join per `search()` call, not one per result —
    /// `item_to_view` indexes into this instead of re-querying the whole store.
    fn categories_tags_lookup(&self) -> CoreResult<HashMap<String, (Vec<String>, Vec<String>)>> {
        let eager = self.ctx.store.get_all_items_eager()?;
        Ok(eager.into_iter().map(|(i, c, t)| (i.id, (c, t))).collect())
    }

    fn item_to_view(&self, item: &Item, lookup: &HashMap<String, (Vec<String>, Vec<String>)>) -> ItemView {
        let (categories, tags) = lookup.get(&item.id).cloned().unwrap_or_default();
        ItemView {
            id: item.id.clone(),
            title: item.title.clone(),
            content: item.content.clone(),
            source_type: item.source_type.as_str().to_string(),
            source_path: item.source_path.clone(),
            categories,
            tags,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }

    fn apply_filters(&self, items: &mut Vec<ResultItemView>, options: &SearchOptions) {
        if !options.include_categories.is_empty() {
            items.retain(|r| r.item.categories.iter().any(|c| options.include_categories.contains(c)));
        }
        if !options.include_tags.is_empty() {
            items.retain(|r| r.item.tags.iter().any(|t| options.include_tags.contains(t)));
        }
        if !options.include_source_types.is_empty() {
            items.retain(|r| options.include_source_types.contains(&r.item.source_type));
        }
    }

    fn sort_results(&self, items: &mut Vec<ResultItemView>, sort_by: SortBy) {
        match sort_by {
            SortBy::Relevance => items.sort_by(|a, b| {
                b.relevance_score
                    .partial_cmp(&a.relevance_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.item.updated_at.cmp(&a.item.updated_at))
                    .then_with(|| a.item.id.cmp(&b.item.id))
            }),
            SortBy::Date => items.sort_by(|a, b| b.item.updated_at.cmp(&a.item.updated_at)),
            SortBy::Title => items.sort_by(|a, b| a.item.title.cmp(&b.item.title)),
        }
    }

    /// Ordered by each category's first appearance in `items` (already
    /// relevance/sort-ordered), not alphabetically.
    fn group_by_category(&self, items: Vec<ResultItemView>) -> IndexMap<String, Vec<ResultItemView>> {
        let mut grouped: IndexMap<String, Vec<ResultItemView>> = IndexMap::new();
        for item in items {
            let key = item.item.categories.first().cloned().unwrap_or_else(|| "uncategorized".to_string());
            grouped.entry(key).or_default().push(item);
        }
        grouped
    }

    /// `onItemUpserted`: store -> inverted -> vector, failures logged
    /// and not rolled back — `rebuild_all` is the recovery path.
    pub async fn on_item_upserted(&self, item: &Item, chunks: &[Chunk]) -> CoreResult<()> {
        self.ctx.store.save_chunks(&item.id, chunks)?;

        {
            let mut idx = self.ctx.inverted_index.write().await;
            if let Err(e) = idx.add_chunks(chunks) {
                tracing::warn!("inverted index update failed for item {}: {e}", item.id);
            }
        }
        {
            let mut idx = self.ctx.vector_index.write().await;
            idx.update_chunks_for_item(&item.id, chunks);
        }
        {
            let mut legacy = self.ctx.legacy_item_index.write().await;
            if let Err(e) = legacy.upsert(&item.id, &item.title, &item.content) {
                tracing::warn!("legacy item index update failed for item {}: {e}", item.id);
            }
        }
        Ok(())
    }

    /// `onItemDeleted`: the store's cascade delete handles rows.
    pub async fn on_item_deleted(&self, item_id: &str) -> CoreResult<()> {
        {
            let mut idx = self.ctx.inverted_index.write().await;
            if let Err(e) = idx.remove_chunks_for_item(item_id) {
                tracing::warn!("inverted index removal failed for item {item_id}: {e}");
            }
        }
        {
            let mut idx = self.ctx.vector_index.write().await;
            idx.remove_chunks_for_item(item_id);
        }
        {
            let mut legacy = self.ctx.legacy_item_index.write().await;
            if let Err(e) = legacy.remove(item_id) {
                tracing::warn!("legacy item index removal failed for item {item_id}: {e}");
            }
        }
        Ok(())
    }

    /// `rebuildAll`: load all chunks from the store, rebuild both
    /// indices from scratch.
    pub async fn rebuild_all(&self) -> CoreResult<()> {
        let eager = self.ctx.store.get_all_items_eager()?;
        let mut all_chunks = Vec::new();
        for (item, _cats, _tags) in &eager {
            all_chunks.extend(self.ctx.store.get_chunks_for_item(&item.id)?);
        }

        {
            let mut idx = self.ctx.inverted_index.write().await;
            idx.rebuild_chunk_index(&all_chunks).map_err(CoreError::Other)?;
        }
        {
            let mut idx = self.ctx.vector_index.write().await;
            idx.fit_chunks(&all_chunks);
        }
        {
            let mut legacy = self.ctx.legacy_item_index.write().await;
            for (item, _, _) in &eager {
                if let Err(e) = legacy.upsert(&item.id, &item.title, &item.content) {
                    tracing::warn!("legacy item index rebuild failed for {}: {e}", item.id);
                }
            }
        }
        Ok(())
    }
}

fn chunk_to_result(c: &Chunk, score: f64) -> ResultChunk {
    ResultChunk {
        chunk_id: c.id.clone(),
        content: c.content.clone(),
        heading: c.heading.clone(),
        chunk_index: c.chunk_index as i64,
        start_position: c.start_position,
        end_position: c.end_position,
        score,
    }
}

/// Result budgeting: truncate chunk content, cap per-result and
/// running-total content size. Never errors — stops appending and returns
/// the partial result.
fn apply_result_budget(results: Vec<ResultItemView>, config: &crate::core::config::CoreConfig) -> Vec<ResultItemView> {
    let mut out = Vec::with_capacity(results.len());
    let mut total_size = 0usize;

    for mut r in results {
        r.item.content = truncate_chars(&r.item.content, CONTENT_TRUNCATION_THRESHOLD);
        let mut result_size = r.item.content.len();

        r.matched_chunks.truncate(config.max_matched_chunks);
        r.context_chunks.truncate(config.max_context_chunks);

        let mut kept_matched = Vec::with_capacity(r.matched_chunks.len());
        for mut c in r.matched_chunks {
            c.content = truncate_chars(&c.content, config.max_chunk_content_size);
            if result_size + c.content.len() > config.max_result_content_size {
                break;
            }
            result_size += c.content.len();
            kept_matched.push(c);
        }
        r.matched_chunks = kept_matched;

        let mut kept_context = Vec::with_capacity(r.context_chunks.len());
        for mut c in r.context_chunks {
            c.content = truncate_chars(&c.content, config.max_chunk_content_size);
            if result_size + c.content.len() > config.max_result_content_size {
                break;
            }
            result_size += c.content.len();
            kept_context.push(c);
        }
        r.context_chunks = kept_context;

        if total_size + result_size > config.max_total_content_size {
            break;
        }
        total_size += result_size;
        out.push(r);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_truncates_oversized_chunk_content() {
        let oversized = "x".repeat(MAX_CHUNK_CONTENT_SIZE + 500);
        let results = vec![ResultItemView {
            item: ItemView {
                id: "i".into(),
                title: "T".into(),
                content: "short".into(),
                source_type: "document".into(),
                source_path: None,
                categories: vec![],
                tags: vec![],
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
            relevance_score: 1.0,
            matched_fields: vec![],
            highlights: vec![],
            matched_chunks: vec![ResultChunk {
                chunk_id: "c1".into(),
                content: oversized,
                heading: "".into(),
                chunk_index: 0,
                start_position: 0,
                end_position: 10,
                score: 1.0,
            }],
            context_chunks: vec![],
        }];
        let budgeted = apply_result_budget(results, &crate::core::config::CoreConfig::default());
        assert_eq!(budgeted[0].matched_chunks[0].content.chars().count(), MAX_CHUNK_CONTENT_SIZE);
    }
}
