//! Recursive document chunking.
//!
//! Splits text into size-bounded segments along semantic boundaries,
//! preferring the largest boundary that fits: paragraph breaks, then
//! sentence ends, then word gaps, then raw character positions. Adjacent
//! chunks share a configurable overlap of trailing context from the
//! previous chunk so meaning that spans a boundary stays retrievable.

use crate::config::RagConfig;

/// Separator levels tried in order, largest semantic boundary first.
const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// A chunk of text with its byte offset in the original input.
///
/// `start_offset` points at the first byte of `text` (including the
/// overlap prefix) within the document the span was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// The chunk text.
    pub text: String,
    /// Byte offset of `text` within the original input.
    pub start_offset: usize,
}

/// A strategy for splitting raw text into retrieval-sized spans.
///
/// Implementations must be deterministic: the same input always yields
/// the same span sequence. Chunk identity and embeddings are assigned
/// later by the ingestion pipeline.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered spans.
    ///
    /// Returns an empty `Vec` for empty input, and exactly one span when
    /// the input already fits within the configured chunk size.
    fn chunk(&self, text: &str) -> Vec<ChunkSpan>;
}

/// Splits text hierarchically: paragraphs, sentences, words, characters.
///
/// Segments produced by one separator level are merged greedily up to
/// `chunk_size` bytes; any single segment that still exceeds the limit
/// is split again with the next level. After boundary splitting, every
/// chunk except the first is extended backwards by up to `chunk_overlap`
/// bytes of context from the previous chunk. The overlap counts against
/// the `chunk_size` budget, so no chunk exceeds `chunk_size` bytes, and
/// all cuts land on UTF-8 character boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum bytes per chunk, before the overlap prefix
    /// * `chunk_overlap` — bytes of trailing context shared with the
    ///   previous chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Build a chunker from the engine configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let spans = split_recursive(text, 0..text.len(), self.chunk_size, &SEPARATORS);

        spans
            .iter()
            .enumerate()
            .map(|(i, range)| {
                let start = if i == 0 {
                    range.start
                } else {
                    // Extend backwards into the previous chunk for overlap:
                    // never past its start, never beyond the chunk_size
                    // budget, always onto a char boundary.
                    let floor = spans[i - 1].start;
                    let budget = range.end.saturating_sub(self.chunk_size);
                    let target = range
                        .start
                        .saturating_sub(self.chunk_overlap)
                        .max(floor)
                        .max(budget)
                        .min(range.start);
                    ceil_char_boundary(text, target)
                };
                ChunkSpan { text: text[start..range.end].to_string(), start_offset: start }
            })
            .collect()
    }
}

/// Split `range` of `text` into sub-ranges of at most `chunk_size` bytes.
///
/// The returned ranges tile `range` exactly — no gaps, no overlaps — so
/// the overlap pass above can reason about natural chunk starts.
fn split_recursive(
    text: &str,
    range: std::ops::Range<usize>,
    chunk_size: usize,
    separators: &[&str],
) -> Vec<std::ops::Range<usize>> {
    if range.len() <= chunk_size {
        return vec![range];
    }

    let (separator, remaining) = match separators.split_first() {
        Some((sep, rest)) => (*sep, rest),
        // All boundary levels exhausted: raw character positions.
        None => return split_by_chars(text, range, chunk_size),
    };

    if !text[range.clone()].contains(separator) {
        return split_recursive(text, range, chunk_size, remaining);
    }

    split_and_merge(text, range, chunk_size, separator, remaining)
}

/// Split at `separator` (keeping the separator attached to the preceding
/// segment), then merge adjacent segments greedily while they fit in
/// `chunk_size`. Oversized segments recurse with the next separator level.
fn split_and_merge(
    text: &str,
    range: std::ops::Range<usize>,
    chunk_size: usize,
    separator: &str,
    remaining: &[&str],
) -> Vec<std::ops::Range<usize>> {
    let mut chunks = Vec::new();
    let mut current = range.start..range.start;

    let flush = |piece: std::ops::Range<usize>, chunks: &mut Vec<std::ops::Range<usize>>| {
        if piece.is_empty() {
            return;
        }
        if piece.len() > chunk_size {
            chunks.extend(split_recursive(text, piece, chunk_size, remaining));
        } else {
            chunks.push(piece);
        }
    };

    let mut cursor = range.start;
    while cursor < range.end {
        let segment_end = match text[cursor..range.end].find(separator) {
            Some(pos) => cursor + pos + separator.len(),
            None => range.end,
        };

        if current.is_empty() || segment_end - current.start <= chunk_size {
            current.end = segment_end;
        } else {
            flush(current, &mut chunks);
            current = cursor..segment_end;
        }
        cursor = segment_end;
    }
    flush(current, &mut chunks);

    chunks
}

/// Last-resort splitting at raw character positions.
///
/// Cuts every `chunk_size` bytes, pulled back onto a char boundary. Each
/// piece contains at least one character, so a multi-byte character never
/// stalls progress even when `chunk_size` is smaller than its encoding.
fn split_by_chars(
    text: &str,
    range: std::ops::Range<usize>,
    chunk_size: usize,
) -> Vec<std::ops::Range<usize>> {
    let mut chunks = Vec::new();
    let mut start = range.start;

    while start < range.end {
        let mut end = floor_char_boundary(text, (start + chunk_size).min(range.end));
        if end <= start {
            end = ceil_char_boundary(text, start + 1).min(range.end);
        }
        chunks.push(start..end);
        start = end;
    }

    chunks
}

/// Largest char boundary less than or equal to `index`.
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest char boundary greater than or equal to `index`.
fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(text.len())
}
