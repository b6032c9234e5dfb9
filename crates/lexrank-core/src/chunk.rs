//! Chunk offset invariants.
//!
//! Offsets count Unicode scalar values (chars), not bytes, so spans stay
//! valid for any UTF-8 body.

use crate::error::{Error, Result};
use crate::types::{Chunk, Document, Span};

/// Slice `body` by a char span. `None` when the span is out of bounds or inverted.
pub fn slice_chars(body: &str, span: Span) -> Option<&str> {
    if span.start > span.end {
        return None;
    }
    let mut boundaries = body.char_indices().map(|(i, _)| i).chain(std::iter::once(body.len()));
    let start = boundaries.nth(span.start)?;
    let end = if span.end == span.start {
        start
    } else {
        boundaries.nth(span.end - span.start - 1)?
    };
    body.get(start..end)
}

/// Check one parent's chunks in the order given.
///
/// Indices must be strictly increasing, starts non-decreasing, and each chunk
/// may overlap its predecessor by at most `max_overlap` chars.
pub fn validate_chunks(parent: &Document, chunks: &[&Chunk], max_overlap: usize) -> Result<()> {
    let body_len = parent.body.chars().count();
    let mut prev: Option<&Chunk> = None;
    for chunk in chunks {
        if chunk.parent_id != parent.id {
            return Err(Error::invalid_document(
                &chunk.id,
                format!("chunk parent '{}' does not match '{}'", chunk.parent_id, parent.id),
            ));
        }
        let Span { start, end } = chunk.span;
        if start >= end || end > body_len {
            return Err(Error::invalid_document(
                &chunk.id,
                format!("span [{start}, {end}) outside parent body of {body_len} chars"),
            ));
        }
        match slice_chars(&parent.body, chunk.span) {
            Some(text) if text == chunk.text => {}
            _ => {
                return Err(Error::invalid_document(
                    &chunk.id,
                    "chunk text does not match parent body at its span",
                ))
            }
        }
        if let Some(p) = prev {
            if chunk.index <= p.index {
                return Err(Error::invalid_document(
                    &chunk.id,
                    format!("index {} does not follow {}", chunk.index, p.index),
                ));
            }
            if start < p.span.start {
                return Err(Error::invalid_document(&chunk.id, "chunk offsets decrease with index"));
            }
            let overlap = p.span.end.saturating_sub(start);
            if overlap > max_overlap {
                return Err(Error::invalid_document(
                    &chunk.id,
                    format!("overlap of {overlap} chars exceeds bound {max_overlap}"),
                ));
            }
        }
        prev = Some(chunk);
    }
    Ok(())
}
