//! Token budgets and text chunking for oversized files.
//!
//! # Design
//!
//! - `TokenBudget` defines a provider's context window with room reserved for
//!   the prompt template and the expected JSON output
//! - `TextChunker` divides file content into line-preserving pieces that fit
//!   within a character budget
//!
//! Every size in the pipeline is expressed in tokens. The chunker works on
//! characters and converts with [`CHARS_PER_TOKEN`].

/// Approximate characters per token used to convert token budgets into
/// character budgets (and as the fallback token estimate).
pub const CHARS_PER_TOKEN: usize = 4;

/// Token budget configuration for a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBudget {
    /// Maximum input tokens the model supports
    pub max_input_tokens: usize,
    /// Tokens reserved for the prompt template
    pub reserved_for_prompt: usize,
    /// Tokens reserved for the JSON response
    pub reserved_for_output: usize,
    /// Safety margin as percentage (0.0 - 1.0)
    safety_margin_pct: f64,
}

impl TokenBudget {
    /// Create a new token budget with custom parameters.
    pub fn new(
        max_input_tokens: usize,
        reserved_for_prompt: usize,
        reserved_for_output: usize,
        safety_margin_pct: f64,
    ) -> Self {
        Self {
            max_input_tokens,
            reserved_for_prompt,
            reserved_for_output,
            safety_margin_pct: safety_margin_pct.clamp(0.0, 0.9),
        }
    }

    /// Budget for a context window using the standard reservations.
    pub fn for_context_window(max_input_tokens: usize) -> Self {
        Self::new(max_input_tokens, 1_000, 4_000, 0.10)
    }

    /// Same reservations with a different context window.
    pub fn with_context_window(&self, max_input_tokens: usize) -> Self {
        Self {
            max_input_tokens,
            ..self.clone()
        }
    }

    /// Tokens available for file content in a single call.
    ///
    /// Subtracts reserved tokens and applies the safety margin. Never zero.
    pub fn available_for_content(&self) -> usize {
        let reserved = self.reserved_for_prompt + self.reserved_for_output;
        let usable = self.max_input_tokens.saturating_sub(reserved);
        ((usable as f64 * (1.0 - self.safety_margin_pct)) as usize).max(1)
    }

    /// Whether content of the given estimated size fits in one call.
    pub fn fits(&self, estimated_tokens: usize) -> bool {
        estimated_tokens <= self.available_for_content()
    }
}

/// Splits text into bounded, line-preserving chunks.
///
/// Deterministic for identical input. With zero overlap the chunks
/// concatenate back to the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a chunker with a character budget and overlap.
    ///
    /// Overlap is clamped to half the budget.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars / 2),
        }
    }

    /// Create a chunker from token sizes.
    pub fn from_tokens(chunk_tokens: usize, overlap_tokens: usize) -> Self {
        Self::new(
            chunk_tokens.saturating_mul(CHARS_PER_TOKEN),
            overlap_tokens.saturating_mul(CHARS_PER_TOKEN),
        )
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split text into chunks.
    ///
    /// Text that fits the budget comes back as a single chunk. Otherwise lines
    /// are packed greedily into `max - overlap` characters so the overlap
    /// prefix still fits. A line that only fits the full budget gets a chunk
    /// of its own with a shortened prefix. Only a line longer than the full
    /// budget is hard-wrapped.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.chars().count() <= self.max_chars {
            return vec![text.to_string()];
        }

        let step = self.max_chars - self.overlap_chars;
        let primary = split_on_lines(text, step, self.max_chars);
        if self.overlap_chars == 0 {
            return primary;
        }

        let mut chunks = Vec::with_capacity(primary.len());
        for (i, chunk) in primary.iter().enumerate() {
            let room = self.max_chars.saturating_sub(chunk.chars().count());
            let overlap = self.overlap_chars.min(room);
            if i == 0 || overlap == 0 {
                chunks.push(chunk.clone());
                continue;
            }
            let tail = overlap_tail(&primary[i - 1], overlap);
            chunks.push(format!("{}{}", tail, chunk));
        }
        chunks
    }
}

/// Greedy line packing into `budget` characters.
///
/// A line longer than `budget` but within `max` becomes its own chunk; a
/// line longer than `max` is hard-wrapped at `max`.
fn split_on_lines(text: &str, budget: usize, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len <= budget {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= budget {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        if line_len <= max {
            chunks.push(line.to_string());
            continue;
        }

        // Single line over the full budget: wrap at the character boundary
        // and keep a short remainder open so following lines can join it.
        let mut pieces = hard_wrap(line, max);
        if let Some(last) = pieces.pop() {
            chunks.extend(pieces);
            let last_len = last.chars().count();
            if last_len <= budget {
                current_len = last_len;
                current = last;
            } else {
                chunks.push(last);
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut a line into pieces of at most `width` characters.
fn hard_wrap(line: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut count = 0;
    for c in line.chars() {
        if count == width {
            pieces.push(std::mem::take(&mut piece));
            count = 0;
        }
        piece.push(c);
        count += 1;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Trailing context carried into the next chunk.
///
/// Takes the last `n` characters of `prev`, trimmed forward to the next line
/// start when the window begins mid-line.
fn overlap_tail(prev: &str, n: usize) -> &str {
    let total = prev.chars().count();
    if total <= n {
        return prev;
    }
    let start = prev
        .char_indices()
        .nth(total - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &prev[start..];
    if prev[..start].ends_with('\n') {
        return tail;
    }
    match tail.find('\n') {
        Some(pos) if pos + 1 < tail.len() => &tail[pos + 1..],
        _ => tail,
    }
}
