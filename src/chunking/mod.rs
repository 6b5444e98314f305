//! The chunker: splits `(title, content)` into ordered, offset-stamped chunks
//! via a three-tier heading/paragraph/sliding-window algorithm. Never fails
//! its caller — any internal problem degrades to a single whole-content
//! chunk rather than a propagated error.
//!
//! Chunk/segment shapes follow a `DocumentChunk`/`ChunkMetadata` split:
//! offsets into the
//! original content, a heading carried from its section, and a small set of
//! derived metadata flags (word/char count, has_code, has_lists).

use crate::core::model::{Chunk, MetadataValue};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub overlap_ratio: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 100,
            max_chunk_size: 1500,
            overlap_ratio: 0.2,
        }
    }
}

impl From<&crate::core::config::CoreConfig> for ChunkingConfig {
    fn from(cfg: &crate::core::config::CoreConfig) -> Self {
        Self {
            min_chunk_size: cfg.min_chunk_size,
            max_chunk_size: cfg.max_chunk_size,
            overlap_ratio: cfg.overlap_ratio,
        }
    }
}

struct Segment {
    heading: String,
    body: String,
    start_offset: usize,
}

pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split `content` into an ordered chunk sequence. `item_id` is left
    /// empty — the caller stamps it in before persisting.
    pub fn chunk(&self, content: &str, title: &str) -> Vec<Chunk> {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.chunk_inner(content, title))) {
            Ok(chunks) => chunks,
            Err(_) => {
                tracing::warn!("chunker panicked, falling back to degenerate single chunk");
                self.degenerate(content, title)
            }
        }
    }

    fn chunk_inner(&self, content: &str, title: &str) -> Vec<Chunk> {
        if content.is_empty() {
            return Vec::new();
        }
        // Short-content degenerate path only applies when there's no heading
        // structure to preserve; a short multi-section document still splits
        // on its headings.
        if content.len() < self.config.min_chunk_size * 2 && !has_heading_markers(content) {
            return self.degenerate(content, title);
        }

        let segments = split_headings(content);
        let mut raw: Vec<(String, String, usize)> = Vec::new();
        for seg in segments {
            for (body, start_offset) in split_paragraphs(&seg.body, seg.start_offset) {
                raw.push((seg.heading.clone(), body, start_offset));
            }
        }

        let coalesced = coalesce_small(raw, self.config.min_chunk_size, self.config.max_chunk_size);

        let mut windows: Vec<(String, String, usize)> = Vec::new();
        for (heading, body, start_offset) in coalesced {
            if body.len() > self.config.max_chunk_size {
                windows.extend(self.sliding_window(&heading, &body, start_offset));
            } else {
                windows.push((heading, body, start_offset));
            }
        }

        if windows.is_empty() {
            return self.degenerate(content, title);
        }

        windows
            .into_iter()
            .enumerate()
            .filter(|(_, (_, body, _))| !body.trim().is_empty())
            .map(|(idx, (heading, body, start_offset))| {
                let end_offset = start_offset + body.len();
                self.build_chunk(idx, body, heading, start_offset, end_offset)
            })
            .collect()
    }

    fn degenerate(&self, content: &str, title: &str) -> Vec<Chunk> {
        if content.is_empty() {
            return Vec::new();
        }
        let heading = if title.is_empty() { String::new() } else { title.to_string() };
        vec![self.build_chunk(0, content.to_string(), heading, 0, content.len())]
    }

    fn sliding_window(&self, heading: &str, body: &str, base_offset: usize) -> Vec<(String, String, usize)> {
        let max = self.config.max_chunk_size;
        let stride = ((max as f64) * (1.0 - self.config.overlap_ratio)).max(1.0) as usize;
        let bytes = body.as_bytes();
        let len = bytes.len();
        let mut out = Vec::new();
        let mut start = 0usize;
        while start < len {
            let mut end = (start + max).min(len);
            while end < len && !body.is_char_boundary(end) {
                end -= 1;
            }
            out.push((heading.to_string(), body[start..end].to_string(), base_offset + start));
            if end >= len {
                break;
            }
            let mut next = start + stride;
            while next < len && !body.is_char_boundary(next) {
                next += 1;
            }
            if next <= start {
                next = end;
            }
            start = next;
        }
        out
    }

    fn build_chunk(&self, index: usize, content: String, heading: String, start: usize, end: usize) -> Chunk {
        let mut chunk = Chunk::new(String::new(), index, content, heading, start, end);
        enrich_metadata(&mut chunk);
        chunk
    }
}

/// True if `content` contains at least one `#`-style or HTML heading marker.
/// Cheap pre-check so short inputs with real section structure skip the
/// single-chunk degenerate path instead of losing their headings.
fn has_heading_markers(content: &str) -> bool {
    let heading_re_md = regex::Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap();
    if heading_re_md.is_match(content) {
        return true;
    }
    let heading_re_html = regex::Regex::new(r"(?i)<h([1-6])[^>]*>(.*?)</h[1-6]>").unwrap();
    heading_re_html.is_match(content)
}

/// Detect `#`-style or literal HTML heading markers and split into segments.
/// No headings found -> one heading-less segment covering everything.
fn split_headings(content: &str) -> Vec<Segment> {
    let heading_re_md = regex::Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap();
    let heading_re_html = regex::Regex::new(r"(?i)<h([1-6])[^>]*>(.*?)</h[1-6]>").unwrap();

    let mut boundaries: Vec<(usize, usize, String)> = Vec::new(); // (match_start, content_start, heading_text)
    for m in heading_re_md.find_iter(content) {
        if let Some(caps) = heading_re_md.captures(&content[m.start()..m.end()]) {
            let heading_text = caps.get(2).map(|g| g.as_str().trim().to_string()).unwrap_or_default();
            boundaries.push((m.start(), m.end(), heading_text));
        }
    }
    if boundaries.is_empty() {
        for caps in heading_re_html.captures_iter(content) {
            let whole = caps.get(0).unwrap();
            let heading_text = caps.get(2).map(|g| g.as_str().trim().to_string()).unwrap_or_default();
            boundaries.push((whole.start(), whole.end(), heading_text));
        }
    }

    if boundaries.is_empty() {
        return vec![Segment {
            heading: String::new(),
            body: content.to_string(),
            start_offset: 0,
        }];
    }

    boundaries.sort_by_key(|b| b.0);
    let mut segments = Vec::new();
    if boundaries[0].0 > 0 {
        segments.push(Segment {
            heading: String::new(),
            body: content[0..boundaries[0].0].to_string(),
            start_offset: 0,
        });
    }
    for (i, (_, heading_end, heading_text)) in boundaries.iter().enumerate() {
        let body_start = *heading_end;
        let body_end = boundaries.get(i + 1).map(|b| b.0).unwrap_or(content.len());
        let body = content.get(body_start..body_end).unwrap_or("").to_string();
        segments.push(Segment {
            heading: heading_text.clone(),
            body,
            start_offset: body_start,
        });
    }
    segments
}

/// Split on blank-line boundaries, tracking absolute offsets.
fn split_paragraphs(body: &str, base_offset: usize) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for part in body.split("\n\n") {
        let part_trim = part.trim_matches('\n');
        let local_start = body[cursor..].find(part_trim).map(|p| cursor + p).unwrap_or(cursor);
        if !part_trim.trim().is_empty() {
            out.push((part_trim.to_string(), base_offset + local_start));
        }
        cursor = local_start + part.len();
    }
    if out.is_empty() && !body.trim().is_empty() {
        out.push((body.to_string(), base_offset));
    }
    out
}

/// Coalesce adjacent same-heading paragraphs under `min_chunk_size` while
/// staying under `max_chunk_size`.
fn coalesce_small(
    items: Vec<(String, String, usize)>,
    min_chunk_size: usize,
    max_chunk_size: usize,
) -> Vec<(String, String, usize)> {
    let mut out: Vec<(String, String, usize)> = Vec::new();
    for (heading, body, offset) in items {
        if let Some(last) = out.last_mut() {
            let can_merge = last.0 == heading
                && last.1.len() < min_chunk_size
                && last.1.len() + body.len() + 2 <= max_chunk_size;
            if can_merge {
                last.1.push_str("\n\n");
                last.1.push_str(&body);
                continue;
            }
        }
        out.push((heading, body, offset));
    }
    out
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being", "to",
    "of", "in", "on", "for", "with", "as", "by", "at", "from", "this", "that", "it", "its", "not",
];

/// Lowercase alphanumeric token extraction with stopword filtering, used both
/// for chunk metadata and for the local keyword match in late chunking.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let word_re = regex::Regex::new(r"[A-Za-z0-9']+").unwrap();
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for m in word_re.find_iter(text) {
        let word = m.as_str().to_lowercase();
        if word.len() < 3 || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if seen.insert(word.clone()) {
            out.push(word);
        }
    }
    out
}

fn enrich_metadata(chunk: &mut Chunk) {
    let word_count = chunk.content.split_whitespace().count();
    let char_count = chunk.content.chars().count();
    let has_code = chunk.content.contains("```") || chunk.content.contains("    fn ") || chunk.content.contains("def ");
    let has_lists = chunk
        .content
        .lines()
        .any(|l| l.trim_start().starts_with('-') || l.trim_start().starts_with('*') || l.trim_start().starts_with(|c: char| c.is_ascii_digit()));

    chunk.metadata.insert("word_count".into(), MetadataValue::from(word_count));
    chunk.metadata.insert("char_count".into(), MetadataValue::from(char_count));
    chunk.metadata.insert("has_code".into(), MetadataValue::from(has_code));
    chunk.metadata.insert("has_lists".into(), MetadataValue::from(has_lists));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_small_document_round_trip() {
        let chunker = Chunker::new(ChunkingConfig::default());
        let content = "Hello world. This is a test.";
        let chunks = chunker.chunk(content, "Hello");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_position, 0);
        assert_eq!(chunks[0].end_position, 28);
        assert!(chunks[0].content.contains("test"));
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunker = Chunker::new(ChunkingConfig::default());
        assert!(chunker.chunk("", "Title").is_empty());
    }

    #[test]
    fn s2_heading_aware_split() {
        let chunker = Chunker::new(ChunkingConfig::default());
        let content = "# Intro\n\nPara one.\n\n# Body\n\nPara two body.";
        let chunks = chunker.chunk(content, "Doc");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading, "Intro");
        assert_eq!(chunks[1].heading, "Body");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn s3_oversize_chunk_window_split() {
        let chunker = Chunker::new(ChunkingConfig::default());
        let content = "a".repeat(5000);
        let chunks = chunker.chunk(&content, "");
        assert_eq!(chunks.len(), 5);
        for w in chunks.windows(2) {
            let delta = w[1].start_position as i64 - w[0].start_position as i64;
            assert!((delta - 1200).abs() <= 2, "delta was {delta}");
        }
    }

    #[test]
    fn chunk_index_is_contiguous() {
        let chunker = Chunker::new(ChunkingConfig::default());
        let content = "# A\n\nfirst paragraph text here that is long enough to count.\n\n# B\n\nsecond paragraph text here that is long enough to count.\n\n# C\n\nthird paragraph text here that is long enough to count as well.";
        let chunks = chunker.chunk(content, "Doc");
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
    }

    #[test]
    fn serialize_then_reparse_is_idempotent() {
        let chunker = Chunker::new(ChunkingConfig::default());
        let content = "# Intro\n\nPara one.\n\n# Body\n\nPara two body.";
        let chunks = chunker.chunk(content, "Doc");
        for c in &chunks {
            let json = serde_json::to_string(c).unwrap();
            let back: Chunk = serde_json::from_str(&json).unwrap();
            assert_eq!(back.id, c.id);
            assert_eq!(back.content, c.content);
            assert_eq!(back.start_position, c.start_position);
            assert_eq!(back.end_position, c.end_position);
        }
    }
}
