//! Character-budget text chunking with overlap.
//!
//! Lengths are measured in Unicode scalar values. Each chunk ends at the best boundary that
//! fits the budget, trying in order:
//!
//! 1. a paragraph break (`\n\n`),
//! 2. a line break,
//! 3. the end of a sentence (`.`, `!` or `?` followed by whitespace),
//! 4. any whitespace,
//! 5. a hard cut at `chunk_size`.
//!
//! The next chunk restarts up to `chunk_overlap` characters before the previous end, moved
//! forward to a word start when possible. Every chunk records how many leading bytes it shares
//! with its predecessor, so dropping that prefix and concatenating reconstructs the input exactly.

use super::types::{ChunkMetadata, ChunkingError, DocumentChunk};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default maximum overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Chunk size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Upper bound on characters per chunk.
    pub chunk_size: usize,
    /// Upper bound on characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// One chunk and its position in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Chunk text, a verbatim slice of the input.
    pub text: String,
    /// Byte offset of the chunk in the input.
    pub start: usize,
    /// Leading bytes shared with the previous chunk.
    pub overlap: usize,
}

impl TextSpan {
    /// Portion of the chunk not covered by its predecessor.
    pub fn fresh(&self) -> &str {
        &self.text[self.overlap..]
    }
}

/// Split `text` into ordered, overlapping chunks.
pub fn chunk_text(text: &str, settings: &ChunkSettings) -> Result<Vec<TextSpan>, ChunkingError> {
    if settings.chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if settings.chunk_overlap >= settings.chunk_size {
        return Err(ChunkingError::OverlapTooLarge {
            chunk_overlap: settings.chunk_overlap,
            chunk_size: settings.chunk_size,
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let mut offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    offsets.push(text.len());

    let total = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut previous_end = 0;

    while start < total {
        let limit = (start + settings.chunk_size).min(total);
        let end = if limit == total {
            total
        } else {
            find_break(&chars, start, limit, settings.chunk_overlap)
        };

        let shared_until = previous_end.max(start);
        spans.push(TextSpan {
            text: text[offsets[start]..offsets[end]].to_string(),
            start: offsets[start],
            overlap: offsets[shared_until] - offsets[start],
        });

        if end == total {
            break;
        }
        previous_end = end;
        start = next_start(&chars, start, end, settings.chunk_overlap);
    }

    Ok(spans)
}

/// Chunk `text` and tag every chunk with where it came from.
///
/// Whitespace-only chunks are dropped.
pub fn build_documents(
    text: &str,
    file_name: &str,
    index_name: &str,
    settings: &ChunkSettings,
) -> Result<Vec<DocumentChunk>, ChunkingError> {
    let metadata = ChunkMetadata {
        source: format!("/{index_name}/{file_name}"),
        container: index_name.to_string(),
        file_name: file_name.to_string(),
    };

    Ok(chunk_text(text, settings)?
        .into_iter()
        .filter(|span| !span.text.trim().is_empty())
        .map(|span| DocumentChunk {
            content: span.text,
            metadata: metadata.clone(),
        })
        .collect())
}

/// Pick the end of a chunk starting at `start`; the result lies in `(start + overlap, limit]`.
fn find_break(chars: &[char], start: usize, limit: usize, overlap: usize) -> usize {
    let floor = start + overlap + 1;

    let tiers: [&dyn Fn(usize) -> bool; 4] = [
        &|p| p >= 2 && chars[p - 2] == '\n' && chars[p - 1] == '\n',
        &|p| chars[p - 1] == '\n',
        &|p| p >= 2 && chars[p - 1].is_whitespace() && matches!(chars[p - 2], '.' | '!' | '?'),
        &|p| chars[p - 1].is_whitespace(),
    ];

    for is_boundary in tiers {
        if let Some(position) = (floor..=limit).rev().find(|&p| is_boundary(p)) {
            return position;
        }
    }
    limit
}

/// Where the chunk after `[start, end)` begins.
fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 || end - overlap <= start {
        return end;
    }

    let candidate = end - overlap;
    if chars[candidate - 1].is_whitespace() {
        return candidate;
    }
    (candidate..=end)
        .find(|&p| chars[p - 1].is_whitespace())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(chunk_size: usize, chunk_overlap: usize) -> ChunkSettings {
        ChunkSettings {
            chunk_size,
            chunk_overlap,
        }
    }

    fn sample_text() -> String {
        let words = [
            "ingestion", "pipeline", "naïve", "café", "blob", "ledger", "vector", "índice",
            "embedding", "chunk", "✓", "überprüfung",
        ];
        let mut text = String::new();
        for i in 0..900 {
            text.push_str(words[i % words.len()]);
            match i % 37 {
                36 => text.push_str(".\n\n"),
                17 => text.push('\n'),
                11 | 29 => text.push_str("! "),
                _ => text.push(' '),
            }
        }
        text
    }

    fn reconstruct(spans: &[TextSpan]) -> String {
        spans.iter().map(TextSpan::fresh).collect()
    }

    fn assert_invariants(text: &str, spans: &[TextSpan], settings: &ChunkSettings) {
        assert_eq!(reconstruct(spans), text);
        for (i, span) in spans.iter().enumerate() {
            assert!(span.text.chars().count() <= settings.chunk_size);
            assert!(span.text[..span.overlap].chars().count() <= settings.chunk_overlap);
            assert_eq!(&text[span.start..span.start + span.text.len()], span.text);
            if i == 0 {
                assert_eq!(span.overlap, 0);
            }
        }
    }

    #[test]
    fn default_settings_round_trip() {
        let text = sample_text();
        let settings = ChunkSettings::default();
        let spans = chunk_text(&text, &settings).unwrap();

        assert!(spans.len() > 1);
        assert_invariants(&text, &spans, &settings);
    }

    #[test]
    fn small_budgets_round_trip() {
        let text = sample_text();
        for (size, overlap) in [(1, 0), (7, 3), (40, 0), (64, 63), (120, 30)] {
            let settings = settings(size, overlap);
            let spans = chunk_text(&text, &settings).unwrap();
            assert_invariants(&text, &spans, &settings);
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", &ChunkSettings::default()).unwrap().is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let spans = chunk_text("hello world", &ChunkSettings::default()).unwrap();
        assert_eq!(
            spans,
            vec![TextSpan {
                text: "hello world".into(),
                start: 0,
                overlap: 0
            }]
        );
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = "alpha beta. gamma\n\ndelta epsilon zeta eta theta";
        let spans = chunk_text(text, &settings(30, 0)).unwrap();
        assert_eq!(spans[0].text, "alpha beta. gamma\n\n");
    }

    #[test]
    fn falls_back_to_sentence_then_whitespace() {
        let spans = chunk_text("one two. three four five", &settings(16, 0)).unwrap();
        assert_eq!(spans[0].text, "one two. ");

        let spans = chunk_text("one two three four five", &settings(10, 0)).unwrap();
        assert_eq!(spans[0].text, "one two ");
    }

    #[test]
    fn hard_cuts_unbroken_text() {
        let text = "x".repeat(25);
        let spans = chunk_text(&text, &settings(10, 2)).unwrap();
        assert_eq!(spans[0].text.len(), 10);
        assert_eq!(spans[1].overlap, 2);
        assert_invariants(&text, &spans, &settings(10, 2));
    }

    #[test]
    fn overlap_restarts_at_word_start() {
        let text = "aaaa bbbb cccc dddd eeee ffff";
        let spans = chunk_text(text, &settings(15, 6)).unwrap();
        assert_eq!(spans[0].text, "aaaa bbbb cccc ");
        assert_eq!(spans[1].text, "cccc dddd eeee ");
        assert_eq!(spans[1].overlap, 5);
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(matches!(
            chunk_text("text", &settings(0, 0)),
            Err(ChunkingError::InvalidChunkSize)
        ));
        assert!(matches!(
            chunk_text("text", &settings(10, 10)),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn documents_share_metadata_and_skip_blank_chunks() {
        let text = format!("{}\n\n{}", "word ".repeat(5), " ".repeat(30));
        let documents = build_documents(&text, "a.txt", "docs", &settings(26, 0)).unwrap();

        assert_eq!(documents.len(), 1);
        let metadata = &documents[0].metadata;
        assert_eq!(metadata.source, "/docs/a.txt");
        assert_eq!(metadata.container, "docs");
        assert_eq!(metadata.file_name, "a.txt");
    }
}
