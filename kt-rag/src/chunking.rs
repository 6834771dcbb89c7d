//! Page-aware document chunking.
//!
//! [`RecursiveChunker`] splits each page hierarchically by paragraphs,
//! sentences, then words. Chunks never span pages, so every chunk keeps the
//! page number it came from.

use crate::document::Page;

/// A chunk of page text before it is numbered, embedded and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// The chunk text.
    pub text: String,
    /// 1-based page number the text came from.
    pub page: u32,
}

/// A strategy for splitting loaded pages into chunks.
pub trait Chunker: Send + Sync {
    /// Split pages into chunks, in document order.
    ///
    /// Pages with no text produce no chunks.
    fn chunk(&self, pages: &[Page]) -> Vec<PageChunk>;
}

/// Splits text hierarchically: paragraphs → sentences → words.
///
/// First splits by paragraph separators (`\n\n`). If a paragraph exceeds
/// `chunk_size`, splits by sentence boundaries (`. `, `! `, `? `). If a
/// sentence still exceeds `chunk_size`, splits by word boundaries, and
/// finally by characters with `chunk_overlap` characters shared between
/// neighbours.
///
/// # Example
///
/// ```rust,ignore
/// use kt_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(512, 64);
/// let chunks = chunker.chunk(&pages);
/// ```
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
    /// * `chunk_size`: maximum number of bytes per chunk
    /// * `chunk_overlap`: characters shared between chunks cut mid-word
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// Split text by a separator, then merge segments into chunks that respect
/// `chunk_size`. If a segment exceeds `chunk_size`, it is split further
/// using the next-level separator.
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if text.len() <= chunk_size || separators.is_empty() {
        return split_by_size(text, chunk_size, chunk_overlap);
    }

    let separator = separators[0];
    let remaining_separators = &separators[1..];
    let segments = split_keeping_separator(text, separator);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in segments {
        if current.is_empty() {
            current = segment.to_string();
        } else if current.len() + segment.len() <= chunk_size {
            current.push_str(segment);
        } else {
            flush(&mut chunks, &current, chunk_size, chunk_overlap, remaining_separators);
            current = segment.to_string();
        }
    }

    if !current.is_empty() {
        flush(&mut chunks, &current, chunk_size, chunk_overlap, remaining_separators);
    }

    chunks
}

fn flush(
    chunks: &mut Vec<String>,
    current: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) {
    if current.len() > chunk_size {
        chunks.extend(split_and_merge(current, chunk_size, chunk_overlap, separators));
    } else {
        chunks.push(current.to_string());
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character-based splitting with overlap. Cuts only on char boundaries.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_count {
        let mut end = start;
        while end < char_count && boundaries[end + 1] - boundaries[start] <= chunk_size {
            end += 1;
        }
        if end == start {
            // a single char wider than chunk_size
            end = start + 1;
        }
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == char_count {
            break;
        }
        let step = (end - start).saturating_sub(chunk_overlap).max(1);
        start += step;
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, pages: &[Page]) -> Vec<PageChunk> {
        pages
            .iter()
            .flat_map(|page| {
                split_and_merge(&page.text, self.chunk_size, self.chunk_overlap, &SEPARATORS)
                    .into_iter()
                    .filter(|text| !text.trim().is_empty())
                    .map(move |text| PageChunk { text, page: page.page })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str, page: u32) -> Page {
        Page { text: text.to_string(), page }
    }

    #[test]
    fn short_pages_become_single_chunks() {
        let chunker = RecursiveChunker::new(100, 10);
        let chunks = chunker.chunk(&[page("Paris is referenced on page 3.", 3)]);
        assert_eq!(chunks, vec![PageChunk { text: "Paris is referenced on page 3.".into(), page: 3 }]);
    }

    #[test]
    fn chunks_never_span_pages() {
        let chunker = RecursiveChunker::new(20, 5);
        let chunks = chunker.chunk(&[
            page("First page sentence one. First page sentence two.", 1),
            page("Second page.", 2),
        ]);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks.last().map(|c| c.page), Some(2));
        assert!(chunks.iter().filter(|c| c.page == 1).all(|c| !c.text.contains("Second")));
    }

    #[test]
    fn respects_chunk_size() {
        let chunker = RecursiveChunker::new(16, 4);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        for chunk in chunker.chunk(&[page(text, 1)]) {
            assert!(chunk.text.len() <= 16, "chunk too long: {:?}", chunk.text);
        }
    }

    #[test]
    fn size_split_is_char_boundary_safe() {
        let pieces = split_by_size("ééééééééé", 5, 1);
        assert!(!pieces.is_empty());
        assert!(pieces.iter().all(|p| p.len() <= 5));
    }

    #[test]
    fn empty_pages_produce_nothing() {
        let chunker = RecursiveChunker::new(16, 4);
        assert!(chunker.chunk(&[page("", 1), page("   ", 2)]).is_empty());
    }
}
