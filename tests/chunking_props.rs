//! Property tests for the recursive chunker.

use proptest::prelude::*;

use ragfuse::{ChunkSpan, Chunker, RecursiveChunker};

/// Rebuild the original text by dropping each span's overlap prefix.
fn reconstruct(spans: &[ChunkSpan]) -> String {
    let mut rebuilt = String::new();
    for span in spans {
        let skip = rebuilt.len() - span.start_offset;
        rebuilt.push_str(&span.text[skip..]);
    }
    rebuilt
}

/// Chunk size plus a strictly smaller overlap, as the config enforces.
fn params() -> impl Strategy<Value = (usize, usize)> {
    (8usize..120).prop_flat_map(|size| (Just(size), 0..size / 2 + 1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Chunking is a pure function of its input.
    #[test]
    fn chunking_is_deterministic(
        text in "[a-zA-Z0-9äöü .!?\n]{0,400}",
        (chunk_size, overlap) in params(),
    ) {
        let chunker = RecursiveChunker::new(chunk_size, overlap);
        prop_assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    /// No input bytes are lost: stripping overlap prefixes and
    /// concatenating the spans yields the original text.
    #[test]
    fn chunks_cover_the_input_exactly(
        text in "[a-zA-Z0-9äöü .!?\n]{0,400}",
        (chunk_size, overlap) in params(),
    ) {
        let chunker = RecursiveChunker::new(chunk_size, overlap);
        let spans = chunker.chunk(&text);
        prop_assert_eq!(reconstruct(&spans), text);
    }

    /// Every span is non-empty, bounded by chunk_size (overlap prefix
    /// included), and slices the original text at its recorded offset.
    #[test]
    fn spans_are_bounded_and_well_placed(
        text in "[a-zA-Z0-9äöü .!?\n]{1,400}",
        (chunk_size, overlap) in params(),
    ) {
        let chunker = RecursiveChunker::new(chunk_size, overlap);
        let spans = chunker.chunk(&text);
        prop_assert!(!spans.is_empty());
        prop_assert_eq!(spans[0].start_offset, 0);
        for span in &spans {
            prop_assert!(!span.text.is_empty());
            prop_assert!(span.text.len() <= chunk_size);
            prop_assert!(text.is_char_boundary(span.start_offset));
            let end = span.start_offset + span.text.len();
            prop_assert_eq!(&text[span.start_offset..end], span.text.as_str());
        }
    }

    /// Offsets never go backwards, and after the first span each one
    /// starts no earlier than `overlap` bytes before the previous end.
    #[test]
    fn offsets_are_monotonic(
        text in "[a-zA-Z0-9äöü .!?\n]{1,400}",
        (chunk_size, overlap) in params(),
    ) {
        let chunker = RecursiveChunker::new(chunk_size, overlap);
        let spans = chunker.chunk(&text);
        for pair in spans.windows(2) {
            prop_assert!(pair[0].start_offset <= pair[1].start_offset);
            let prev_end = pair[0].start_offset + pair[0].text.len();
            prop_assert!(pair[1].start_offset + overlap >= prev_end);
        }
    }

    /// Input that already fits produces exactly one span.
    #[test]
    fn short_input_is_a_single_span(text in "[a-z .]{1,40}") {
        let chunker = RecursiveChunker::new(64, 16);
        let spans = chunker.chunk(&text);
        prop_assert_eq!(spans.len(), 1);
        prop_assert_eq!(spans[0].text.as_str(), text.as_str());
    }
}
