//! Overlapping text chunking with sentence-boundary snapping.
//!
//! Indices are character positions, not byte offsets, so multi-byte text
//! never splits inside a code point and chunk sizes are stable regardless of
//! encoding width.

/// Sentence endings the boundary search recognizes, in priority order.
const SENTENCE_ENDINGS: [char; 4] = ['.', '!', '?', '\n'];

/// How far past the window end the boundary search may look.
const BOUNDARY_LOOKAHEAD: usize = 50;

/// Cap on the chunk scan; up to one chunk past this count can be emitted
/// before the loop stops.
const MAX_CHUNKS: usize = 1000;

/// Split `text` into overlapping chunks of at most `max_chunk_size`
/// characters (plus up to [`BOUNDARY_LOOKAHEAD`] when snapping to a sentence
/// boundary).
///
/// Text no longer than `max_chunk_size` is returned whole, untrimmed. For
/// longer text, each window `[start, start + max_chunk_size)` is shrunk to
/// the earliest sentence ending found within lookahead range; the next window
/// starts `overlap` characters before the previous end. Chunks that are empty
/// after trimming are dropped but still advance the scan.
pub fn split_text(text: &str, max_chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        // The final window keeps its nominal end past the text so the
        // overlap step below still lands beyond the input and terminates.
        let mut end = start + max_chunk_size;
        if end < chars.len() {
            end = snap_to_boundary(&chars, start, end);
        }

        let chunk: String = chars[start..end.min(chars.len())].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        // The overlap step must advance the scan; when the snapped window
        // is shorter than the overlap it lands at or before the current
        // start, so jump to the window end instead.
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
        if start >= chars.len() || chunks.len() > MAX_CHUNKS {
            break;
        }
    }

    chunks
}

/// Shrink `end` to just past the earliest sentence ending in
/// `(start, end + BOUNDARY_LOOKAHEAD)`. For each ending character the last
/// occurrence in the window is considered; the smallest candidate wins, so a
/// boundary early in the window beats one near the end.
fn snap_to_boundary(chars: &[char], start: usize, end: usize) -> usize {
    let window_end = (end + BOUNDARY_LOOKAHEAD).min(chars.len());
    let mut best_end = end;
    for ending in SENTENCE_ENDINGS {
        if let Some(rel) = chars[start..window_end].iter().rposition(|&c| c == ending) {
            let pos = start + rel;
            if pos > start {
                best_end = best_end.min(pos + 1);
            }
        }
    }
    best_end
}
