//! In-memory TF-IDF vector index: full-refit design, no incremental diffing —
//! a personal knowledge store is small enough that refitting the whole model
//! on every mutation is the simplest correct choice.
//!
//! A plain `HashMap`-of-sparse-vectors model — no external embedding service
//! to call.

use std::collections::HashMap;

use crate::core::model::Chunk;

#[derive(Debug, Clone, serde::Serialize)]
pub struct VectorHit {
    pub chunk_id: String,
    pub item_id: String,
    pub chunk_index: usize,
    pub heading: String,
    pub score: f32,
}

pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<HashMap<usize, f64>>,
    fitted: bool,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            vocab: HashMap::new(),
            idf: Vec::new(),
            vectors: Vec::new(),
            fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn fit_chunks(&mut self, chunks: &[Chunk]) {
        self.chunks = chunks.to_vec();
        self.refit();
    }

    pub fn update_chunks_for_item(&mut self, item_id: &str, new_chunks: &[Chunk]) {
        self.chunks.retain(|c| c.item_id != item_id);
        self.chunks.extend(new_chunks.iter().cloned());
        self.refit();
    }

    pub fn remove_chunks_for_item(&mut self, item_id: &str) {
        self.chunks.retain(|c| c.item_id != item_id);
        self.refit();
    }

    fn refit(&mut self) {
        if self.chunks.is_empty() {
            self.vocab.clear();
            self.idf.clear();
            self.vectors.clear();
            self.fitted = false;
            return;
        }

        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut doc_term_counts: Vec<HashMap<usize, usize>> = Vec::with_capacity(self.chunks.len());

        for chunk in &self.chunks {
            let mut counts: HashMap<usize, usize> = HashMap::new();
            for term in tokenize(&chunk.content) {
                let next_id = vocab.len();
                let id = *vocab.entry(term).or_insert(next_id);
                *counts.entry(id).or_insert(0) += 1;
            }
            doc_term_counts.push(counts);
        }

        let n = self.chunks.len() as f64;
        let mut doc_freq = vec![0usize; vocab.len()];
        for counts in &doc_term_counts {
            for &term_id in counts.keys() {
                doc_freq[term_id] += 1;
            }
        }
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|&df| (n / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let mut vectors = Vec::with_capacity(doc_term_counts.len());
        for counts in &doc_term_counts {
            let total_terms: usize = counts.values().sum();
            let mut vec: HashMap<usize, f64> = HashMap::new();
            for (&term_id, &count) in counts {
                let tf = count as f64 / total_terms.max(1) as f64;
                vec.insert(term_id, tf * idf[term_id]);
            }
            let norm = vec.values().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for v in vec.values_mut() {
                    *v /= norm;
                }
            }
            vectors.push(vec);
        }

        self.vocab = vocab;
        self.idf = idf;
        self.vectors = vectors;
        self.fitted = true;
    }

    fn vectorize_query(&self, query: &str) -> HashMap<usize, f64> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for term in tokenize(query) {
            if let Some(&id) = self.vocab.get(&term) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let total: usize = counts.values().sum();
        let mut vec: HashMap<usize, f64> = HashMap::new();
        for (id, count) in counts {
            let tf = count as f64 / total.max(1) as f64;
            vec.insert(id, tf * self.idf[id]);
        }
        let norm = vec.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in vec.values_mut() {
                *v /= norm;
            }
        }
        vec
    }

    /// Default `top_k = 10`, `min_similarity = 0.05`. Ties broken by
    /// `(-similarity, chunk_id)` for determinism.
    pub fn search_chunks(&self, query: &str, top_k: usize, min_similarity: f64) -> Vec<VectorHit> {
        if !self.fitted {
            return Vec::new();
        }
        let query_vec = self.vectorize_query(query);
        if query_vec.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vec)| {
                let (small, large) = if vec.len() < query_vec.len() { (vec, &query_vec) } else { (&query_vec, vec) };
                let dot: f64 = small.iter().filter_map(|(id, v)| large.get(id).map(|o| v * o)).sum();
                (dot, idx)
            })
            .filter(|(score, _)| *score >= min_similarity)
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| self.chunks[a.1].id.cmp(&self.chunks[b.1].id))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(score, idx)| {
                let chunk = &self.chunks[idx];
                VectorHit {
                    chunk_id: chunk.id.clone(),
                    item_id: chunk.item_id.clone(),
                    chunk_index: chunk.chunk_index,
                    heading: chunk.heading.clone(),
                    score: score as f32,
                }
            })
            .collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Chunk;

    fn chunk(item_id: &str, idx: usize, content: &str) -> Chunk {
        Chunk::new(item_id.to_string(), idx, content.to_string(), "".into(), 0, content.len())
    }

    #[test]
    fn fit_then_search_finds_relevant_chunk() {
        let mut index = VectorIndex::new();
        index.fit_chunks(&[
            chunk("a", 0, "the quick brown fox jumps over the lazy dog"),
            chunk("b", 0, "completely unrelated text about cooking recipes"),
        ]);
        let hits = index.search_chunks("fox jumps", 10, 0.05);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].item_id, "a");
    }

    #[test]
    fn remove_chunks_for_item_empties_its_rows() {
        let mut index = VectorIndex::new();
        index.fit_chunks(&[chunk("a", 0, "alpha beta"), chunk("b", 0, "alpha gamma")]);
        index.remove_chunks_for_item("a");
        let hits = index.search_chunks("alpha", 10, 0.0);
        assert!(hits.iter().all(|h| h.item_id != "a"));
    }

    #[test]
    fn empty_corpus_is_not_fitted() {
        let index = VectorIndex::new();
        assert!(!index.is_fitted());
        assert!(index.search_chunks("anything", 10, 0.0).is_empty());
    }
}
