//! Chunker: splits long text into bounded, overlapping passages on
//! semantically sensible separators (§4.3).
//!
//! Mirrors a recursive-character splitter: try the first separator,
//! recursively split any piece still over `chunk_size` on the next
//! separator, then greedily merge adjacent pieces into windows of at
//! most `chunk_size` characters with `overlap` characters of trailing
//! context carried into the next window.

/// Splitting preference, in order (§4.3).
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", ", ", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// Split `text` into a finite ordered sequence of chunks such that
/// concatenation of adjacent non-overlap portions reconstructs the
/// input modulo separator normalization. Empty or whitespace-only
/// input produces an empty sequence.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let pieces = split_recursive(text, chunk_size, SEPARATORS);
    merge_with_overlap(pieces, chunk_size, overlap)
}

/// Split with the defaults named in §4.3 (`chunk_size=1000, overlap=200`).
pub fn chunk_transcript(text: &str) -> Vec<String> {
    chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
}

/// Split `text` into chunks of at most `chunk_size` characters,
/// respecting character boundaries (never slicing a multi-byte
/// character in half).
fn chunk_by_chars(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(chunk_size).map(|c| c.iter().collect()).collect()
}

fn split_recursive(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((&sep, rest)) = separators.split_first() else {
        return vec![text.to_string()];
    };

    let parts: Vec<&str> = if sep.is_empty() {
        // Character-level fallback: split at chunk_size char boundaries.
        return chunk_by_chars(text, chunk_size.max(1));
    } else {
        text.split(sep).collect()
    };

    let mut out = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if part.chars().count() > chunk_size {
            out.extend(split_recursive(part, chunk_size, rest));
        } else {
            out.push(part.to_string());
        }
        // Re-append the separator to non-final parts so later merging
        // sees the same text shape the input had.
        if i + 1 < parts.len() {
            if let Some(last) = out.last_mut() {
                last.push_str(sep);
            }
        }
    }
    out
}

fn merge_with_overlap(pieces: Vec<String>, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if current.is_empty() {
            current = piece;
            continue;
        }

        if current.chars().count() + piece.chars().count() <= chunk_size {
            current.push_str(&piece);
            continue;
        }

        chunks.push(current.clone());

        let carry: String = if overlap > 0 && current.chars().count() > overlap {
            current.chars().rev().take(overlap).collect::<String>().chars().rev().collect()
        } else {
            String::new()
        };
        current = carry + &piece;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.into_iter().filter(|c| !c.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   \n\t  ", 1000, 200).is_empty());
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunks = chunk_text("hello world", 1000, 200);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn long_input_is_split_into_multiple_bounded_chunks() {
        let paragraph = "word ".repeat(400); // 2000 chars
        let chunks = chunk_text(&paragraph, 1000, 200);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 1400, "chunk length {} exceeds bound", c.len());
        }
    }

    #[test]
    fn prefers_paragraph_breaks_over_character_splitting() {
        let text = format!("{}\n\n{}", "a".repeat(500), "b".repeat(500));
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.iter().any(|c| c.contains("aaaa")));
    }

    #[test]
    fn cyrillic_input_is_sized_by_character_not_byte_count() {
        let word = "привет ";
        let text = word.repeat(300); // well over 1000 chars, ~4200 bytes
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 1200, "chunk char count {} exceeds bound", c.chars().count());
            assert!(!c.contains('\u{FFFD}'), "chunk contains a replacement character: {c:?}");
        }
    }

    #[test]
    fn character_fallback_never_splits_mid_codepoint() {
        let text = "привет".repeat(10);
        let chunks = chunk_by_chars(&text, 5);
        for c in &chunks {
            assert!(!c.contains('\u{FFFD}'), "chunk contains a replacement character: {c:?}");
        }
        assert_eq!(chunks.join(""), text);
    }
}
