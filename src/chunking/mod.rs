#[cfg(test)]
mod tests;

use tracing::debug;

/// Boundary separators tried in order of preference before falling back to a
/// raw character split.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Configuration for document splitting.
///
/// Sizes are in characters, not bytes; the corpus is not ASCII-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Target maximum chunk size in characters
    pub chunk_size: usize,
    /// Number of trailing characters repeated at the start of the next chunk
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Split text into overlapping chunks, preferring paragraph, then line, then
/// word boundaries. Only the overlap seed carried from the previous chunk can
/// push a chunk past `chunk_size` characters.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let pieces = split_recursive(text, &SEPARATORS, config.chunk_size);
    let chunks = merge_with_overlap(pieces, config);

    debug!(
        "Split {} characters into {} chunks",
        text.chars().count(),
        chunks.len()
    );

    chunks
}

/// Break text into pieces no longer than `max_len`, trying coarser separators
/// before finer ones.
fn split_recursive(text: &str, separators: &[&str], max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return split_by_chars(text, max_len);
    };

    if !text.contains(separator) {
        return split_recursive(text, rest, max_len);
    }

    let mut pieces = Vec::new();
    for part in text.split(separator) {
        if part.trim().is_empty() {
            continue;
        }
        if part.chars().count() > max_len {
            pieces.extend(split_recursive(part, rest, max_len));
        } else {
            pieces.push(part.to_string());
        }
    }
    pieces
}

/// Last-resort split for unbroken runs with no usable boundary.
fn split_by_chars(text: &str, max_len: usize) -> Vec<String> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(max_len)
        .map(|window| window.iter().collect())
        .collect()
}

/// Greedily pack pieces into chunks of at most `chunk_size` characters,
/// seeding each new chunk with the tail of its predecessor.
fn merge_with_overlap(pieces: Vec<String>, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    // The overlap seed alone never forces an emit; a chunk must contain at
    // least one fresh piece.
    let mut has_fresh_content = false;

    for piece in pieces {
        let piece_len = piece.chars().count();
        let joined_len = current_len + usize::from(current_len > 0) + piece_len;

        if has_fresh_content && joined_len > config.chunk_size {
            chunks.push(current.clone());
            current = overlap_tail(&current, config.overlap);
            current_len = current.chars().count();
            has_fresh_content = false;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(&piece);
        current_len += piece_len;
        has_fresh_content = true;
    }

    if has_fresh_content && !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// The last `overlap` characters of a chunk, used to seed its successor.
fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= overlap {
        return text.to_string();
    }
    chars[chars.len() - overlap..].iter().collect()
}
