//! Phase 1 merge and phase 2 aggregation.

use std::collections::HashMap;

use crate::index::inverted::ChunkHit;
use crate::index::vector::VectorHit;
use crate::search::budget::{MAX_CONTEXT_CHUNKS_PER_ITEM, MAX_MATCHED_CHUNKS_PER_ITEM};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub item_id: String,
    pub chunk_index: usize,
    pub heading: String,
    pub score: f64,
}

/// Merge keyword + semantic hits by `chunk_id`. `α·s_kw_norm + (1−α)·s_sem`;
/// chunks from only one source keep that source's weighted, normalized score.
pub fn merge_phase1(keyword_hits: Vec<ChunkHit>, semantic_hits: Vec<VectorHit>, alpha: f64) -> Vec<ScoredChunk> {
    let kw_max = keyword_hits.iter().map(|h| h.score).fold(0.0_f32, f32::max);

    #[derive(Default)]
    struct Merged {
        item_id: String,
        chunk_index: usize,
        heading: String,
        kw_norm: Option<f64>,
        sem: Option<f64>,
    }

    let mut merged: HashMap<String, Merged> = HashMap::new();

    for hit in keyword_hits {
        let kw_norm = if kw_max > 0.0 { (hit.score / kw_max) as f64 } else { 0.0 };
        merged.insert(
            hit.chunk_id.clone(),
            Merged {
                item_id: hit.item_id,
                chunk_index: hit.chunk_index,
                heading: hit.heading,
                kw_norm: Some(kw_norm),
                sem: None,
            },
        );
    }

    for hit in semantic_hits {
        merged
            .entry(hit.chunk_id.clone())
            .and_modify(|m| m.sem = Some(hit.score as f64))
            .or_insert(Merged {
                item_id: hit.item_id,
                chunk_index: hit.chunk_index,
                heading: hit.heading,
                kw_norm: None,
                sem: Some(hit.score as f64),
            });
    }

    merged
        .into_iter()
        .map(|(chunk_id, m)| {
            let score = match (m.kw_norm, m.sem) {
                (Some(kw), Some(sem)) => alpha * kw + (1.0 - alpha) * sem,
                (Some(kw), None) => alpha * kw,
                (None, Some(sem)) => (1.0 - alpha) * sem,
                (None, None) => 0.0,
            };
            ScoredChunk {
                chunk_id,
                item_id: m.item_id,
                chunk_index: m.chunk_index,
                heading: m.heading,
                score,
            }
        })
        .collect()
}

pub struct ItemAggregate {
    pub item_id: String,
    pub relevance_score: f64,
    pub matched_chunk_ids: Vec<(String, f64)>,
    pub context_chunk_ids: Vec<String>,
}

/// Group scored chunks by item, cap matched/context per item before the
/// result is built, and load adjacent chunks from the store.
pub fn aggregate_phase2(scored: Vec<ScoredChunk>, store: &Store) -> anyhow::Result<Vec<ItemAggregate>> {
    let mut by_item: HashMap<String, Vec<ScoredChunk>> = HashMap::new();
    for chunk in scored {
        by_item.entry(chunk.item_id.clone()).or_default().push(chunk);
    }

    let mut out = Vec::with_capacity(by_item.len());
    for (item_id, mut chunks) in by_item {
        chunks.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        chunks.truncate(MAX_MATCHED_CHUNKS_PER_ITEM);

        let relevance_score = chunks.first().map(|c| c.score).unwrap_or(0.0);
        let matched_chunk_ids: Vec<(String, f64)> = chunks.iter().map(|c| (c.chunk_id.clone(), c.score)).collect();

        let mut seen: std::collections::HashSet<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let mut context_chunk_ids = Vec::new();
        'outer: for chunk in &chunks {
            let adjacent = store.get_adjacent_chunks(&item_id, chunk.chunk_index)?;
            for adj in adjacent {
                if seen.insert(adj.id.clone()) {
                    context_chunk_ids.push(adj.id);
                    if context_chunk_ids.len() >= MAX_CONTEXT_CHUNKS_PER_ITEM {
                        break 'outer;
                    }
                }
            }
        }

        out.push(ItemAggregate {
            item_id,
            relevance_score,
            matched_chunk_ids,
            context_chunk_ids,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Chunk, Item, SourceType};

    #[test]
    fn merge_phase1_weights_by_alpha_and_keeps_single_source_hits() {
        let keyword_hits = vec![
            ChunkHit { chunk_id: "c1".into(), item_id: "i1".into(), chunk_index: 0, heading: "".into(), score: 10.0 },
            ChunkHit { chunk_id: "c2".into(), item_id: "i1".into(), chunk_index: 1, heading: "".into(), score: 5.0 },
        ];
        let semantic_hits = vec![
            VectorHit { chunk_id: "c1".into(), item_id: "i1".into(), chunk_index: 0, heading: "".into(), score: 0.8 },
            VectorHit { chunk_id: "c3".into(), item_id: "i1".into(), chunk_index: 2, heading: "".into(), score: 0.4 },
        ];
        let merged = merge_phase1(keyword_hits, semantic_hits, 0.6);
        let by_id: HashMap<String, f64> = merged.into_iter().map(|c| (c.chunk_id, c.score)).collect();

        // c1: both sources -> 0.6 * 1.0 (kw max-normalized) + 0.4 * 0.8
        assert!((by_id["c1"] - (0.6 * 1.0 + 0.4 * 0.8)).abs() < 1e-9);
        // c2: keyword only -> 0.6 * (5.0/10.0)
        assert!((by_id["c2"] - (0.6 * 0.5)).abs() < 1e-9);
        // c3: semantic only -> 0.4 * 0.4
        assert!((by_id["c3"] - (0.4 * 0.4)).abs() < 1e-9);
    }

    /// S4 — two-phase aggregation and context: 30-chunk item, phase-1 hits on
    /// chunks {3,7,12,18} with scores {0.9,0.7,0.5,0.3}. Aggregated score is
    /// the max; context chunks are adjacents, deduplicated and capped.
    #[test]
    fn s4_two_phase_aggregation_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("s4.db")).unwrap();
        let item = Item::new("Doc".into(), "x".repeat(3000), SourceType::Document);
        store.save_item(&item).unwrap();

        let chunks: Vec<Chunk> = (0..30)
            .map(|i| Chunk::new(item.id.clone(), i, format!("chunk body {i}"), "".into(), i * 100, i * 100 + 10))
            .collect();
        store.save_chunks(&item.id, &chunks).unwrap();

        let hit_indices = [(3usize, 0.9_f64), (7, 0.7), (12, 0.5), (18, 0.3)];
        let scored: Vec<ScoredChunk> = hit_indices
            .iter()
            .map(|(idx, score)| ScoredChunk {
                chunk_id: chunks[*idx].id.clone(),
                item_id: item.id.clone(),
                chunk_index: *idx,
                heading: "".into(),
                score: *score,
            })
            .collect();

        let aggregates = aggregate_phase2(scored, &store).unwrap();
        assert_eq!(aggregates.len(), 1);
        let agg = &aggregates[0];
        assert!((agg.relevance_score - 0.9).abs() < 1e-9);
        assert_eq!(agg.matched_chunk_ids.len(), 4, "MAX_MATCHED_CHUNKS_PER_ITEM allows all 4 hits");
        assert!(agg.context_chunk_ids.len() <= MAX_CONTEXT_CHUNKS_PER_ITEM);
    }
}
