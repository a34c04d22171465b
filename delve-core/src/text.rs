//! Token-budget algorithms.
//!
//! - [`fit_segments`] shrinks a prompt built from ordered, variable-length
//!   segments until it fits a budget, always trimming the longest segment.
//! - [`chunk_budget`] and [`split_into_chunks`] partition page text so that
//!   every chunk, wrapped in its prompt template, fits the model window.

use crate::brain::TokenCounter;
use crate::error::BudgetError;
use std::collections::VecDeque;

/// Result of a successful [`fit_segments`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fitted {
    /// The rendered prompt that fits.
    pub prompt: String,
    /// Size of `prompt` as reported by the measure function.
    pub size: usize,
    /// Elements dropped to get there.
    pub removed: usize,
}

/// Render `segments`, and while the rendering exceeds `budget`, drop the last
/// element of the longest segment (the first one on ties) and render again.
///
/// Terminates after at most the total number of elements: each step removes
/// one. When every segment is empty and the rendering still does not fit,
/// returns [`BudgetError::Exhausted`].
pub fn fit_segments<T>(
    segments: &mut [Vec<T>],
    render: impl Fn(&[Vec<T>]) -> String,
    measure: impl Fn(&str) -> usize,
    budget: usize,
) -> Result<Fitted, BudgetError> {
    let mut removed = 0;
    loop {
        let prompt = render(segments);
        let size = measure(&prompt);
        if size <= budget {
            return Ok(Fitted {
                prompt,
                size,
                removed,
            });
        }

        let mut longest: Option<usize> = None;
        for (i, segment) in segments.iter().enumerate() {
            if !segment.is_empty() && longest.is_none_or(|j| segment.len() > segments[j].len()) {
                longest = Some(i);
            }
        }
        match longest {
            Some(i) => {
                segments[i].pop();
                removed += 1;
            }
            None => {
                return Err(BudgetError::Exhausted {
                    needed: size,
                    budget,
                });
            }
        }
    }
}

/// Token room left for page text in one summarization prompt.
///
/// `overhead_text` is everything sent besides the chunk itself: the prompt
/// template rendered with empty content plus the system text.
pub fn chunk_budget(
    counter: &TokenCounter,
    overhead_text: &str,
    window: usize,
    reserved: usize,
    margin: usize,
) -> Result<usize, BudgetError> {
    let overhead = counter.count(overhead_text) + reserved + margin;
    match window.checked_sub(overhead) {
        Some(room) if room > 0 => Ok(room),
        _ => Err(BudgetError::ChunkOverhead { overhead, window }),
    }
}

/// Partition `text` into chunks of at most `max_tokens` tokens.
///
/// Lines are packed greedily in order. A line that alone exceeds the budget
/// is split in two (at sentence ends when possible) and retried.
pub fn split_into_chunks(
    text: &str,
    counter: &TokenCounter,
    max_tokens: usize,
) -> Result<Vec<String>, BudgetError> {
    let mut pending: VecDeque<String> = text.split_inclusive('\n').map(String::from).collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;

    while let Some(piece) = pending.pop_front() {
        let tokens = counter.count(&piece);
        if current_tokens + tokens <= max_tokens {
            current.push_str(&piece);
            current_tokens += tokens;
        } else if tokens > max_tokens {
            if piece.chars().count() <= 1 {
                return Err(BudgetError::Unsplittable {
                    tokens,
                    budget: max_tokens,
                });
            }
            for part in split_paragraph(&piece, 2).into_iter().rev() {
                if !part.is_empty() {
                    pending.push_front(part);
                }
            }
        } else {
            chunks.push(std::mem::take(&mut current));
            current = piece;
            current_tokens = tokens;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

/// Split a paragraph into `count` parts of roughly equal sentence count.
///
/// Tries `.` then `,` as sentence terminators; a paragraph with a single
/// sentence is split by characters instead.
pub fn split_paragraph(paragraph: &str, count: usize) -> Vec<String> {
    for sep in ['.', ','] {
        let sentences = split_with_ends(paragraph, sep);
        if sentences.len() <= 1 {
            continue;
        }
        return split_by_count(&sentences, count)
            .into_iter()
            .map(|group| group.concat())
            .collect();
    }
    let chars: Vec<char> = paragraph.chars().collect();
    split_by_count(&chars, count)
        .into_iter()
        .map(|group| group.iter().collect())
        .collect()
}

fn split_with_ends(text: &str, sep: char) -> Vec<String> {
    text.split_inclusive(sep).map(String::from).collect()
}

fn split_by_count<T>(items: &[T], count: usize) -> Vec<&[T]> {
    let count = count.max(1);
    let avg = items.len() / count;
    let remainder = items.len() % count;
    let mut start = 0;
    let mut groups = Vec::with_capacity(count);
    for i in 0..count {
        let end = start + avg + usize::from(i < remainder);
        groups.push(&items[start..end]);
        start = end;
    }
    groups
}
