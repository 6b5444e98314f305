//! Hard result-size budgets. Applied while serializing; never an
//! error — truncation is silent, observable only via shortened chunk lists.

pub const MAX_CHUNK_CONTENT_SIZE: usize = 1500;
pub const MAX_MATCHED_CHUNKS: usize = 5;
pub const MAX_CONTEXT_CHUNKS: usize = 3;
pub const MAX_RESULT_CONTENT_SIZE: usize = 30_000;
pub const MAX_TOTAL_CONTENT_SIZE: usize = 100_000;
pub const CONTENT_TRUNCATION_THRESHOLD: usize = 2000;

pub const MAX_MATCHED_CHUNKS_PER_ITEM: usize = 5;
pub const MAX_CONTEXT_CHUNKS_PER_ITEM: usize = 3;

pub const LATE_CHUNK_THRESHOLD: usize = 2000;
pub const SNIPPET_RADIUS: usize = 750;

/// Truncates `s` to at most `max_chars` characters (char-boundary safe).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
