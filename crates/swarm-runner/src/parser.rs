// SPDX-License-Identifier: MIT

//! Output-stream parsing: line splitting and ready/busy tail classification
//! (spec §4.1).

use crate::patterns::PatternSet;
use std::collections::VecDeque;

/// Bounds on buffering, independent of any one agent type.
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    /// Max bytes kept in the tail buffer used for ready/busy classification.
    pub tail_bytes: usize,
    /// Max bytes kept in the pending (incomplete-line) buffer.
    pub pending_bytes: usize,
    /// Max bytes of a line forwarded in an `output_line` preview.
    pub line_preview_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self { tail_bytes: 4096, pending_bytes: 8192, line_preview_bytes: 500 }
    }
}

/// Why the ready bit changed, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyReason {
    PromptMatch,
    BusyMatch,
    OutputReceived,
}

/// A complete line pulled out of the stream, preview-truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub truncated: bool,
}

/// What happened while processing one chunk of raw bytes.
#[derive(Debug, Clone, Default)]
pub struct FeedResult {
    pub lines: Vec<OutputLine>,
    /// `Some((ready, reason))` only when the ready bit actually changed.
    pub transition: Option<(bool, ReadyReason)>,
}

/// Stateful line splitter and ready/busy classifier for one agent's output.
pub struct OutputParser {
    patterns: PatternSet,
    limits: ParserLimits,
    pending: Vec<u8>,
    tail: VecDeque<u8>,
    ready: bool,
}

impl OutputParser {
    pub fn new(patterns: PatternSet, limits: ParserLimits) -> Self {
        Self { patterns, limits, pending: Vec::new(), tail: VecDeque::new(), ready: false }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Forces the ready bit to `false`, as `SendInput` does on the local
    /// view of an agent it just fed input to. Returns `true` iff the bit
    /// actually changed.
    pub fn force_busy(&mut self) -> bool {
        let was_ready = self.ready;
        self.ready = false;
        was_ready
    }

    /// Process one chunk of raw bytes read from the pty.
    pub fn feed(&mut self, chunk: &[u8]) -> FeedResult {
        let mut result = FeedResult::default();

        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop(); // drop '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            result.lines.push(truncate_line(&line, self.limits.line_preview_bytes));
        }
        if self.pending.len() > self.limits.pending_bytes {
            let overflow = self.pending.len() - self.limits.pending_bytes;
            self.pending.drain(..overflow);
        }

        for &byte in chunk {
            self.tail.push_back(byte);
        }
        while self.tail.len() > self.limits.tail_bytes {
            self.tail.pop_front();
        }
        let tail_str = String::from_utf8_lossy(&self.tail.iter().copied().collect::<Vec<u8>>()).into_owned();

        let was_ready = self.ready;
        if self.patterns.prompt_ready.is_match(&tail_str) {
            self.ready = true;
            if !was_ready {
                result.transition = Some((true, ReadyReason::PromptMatch));
            }
        } else if self.patterns.busy.is_match(&tail_str) {
            self.ready = false;
            if was_ready {
                result.transition = Some((false, ReadyReason::BusyMatch));
            }
        } else if was_ready && chunk.iter().any(|b| !b.is_ascii_whitespace()) {
            self.ready = false;
            result.transition = Some((false, ReadyReason::OutputReceived));
        }

        result
    }
}

fn truncate_line(raw: &[u8], limit: usize) -> OutputLine {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= limit {
        OutputLine { text: text.into_owned(), truncated: false }
    } else {
        let mut end = limit;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        OutputLine { text: text[..end].to_string(), truncated: true }
    }
}
