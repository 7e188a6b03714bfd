//! Citation markers in model output.
//!
//! The model is asked to end its answer with `<!-- SOURCES: 1,3 -->`. The
//! extractor strips that marker, validates the indices against the context
//! blocks of the turn, and decides which documents to show as sources. The
//! [`MarkerGuard`] keeps the marker out of the live text stream.

use regex::Regex;

/// Parsed citation information from one answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Citations {
    /// Answer text with the marker removed.
    pub cleaned_text: String,
    /// Valid 1-based indices from the marker, deduplicated in order.
    pub used_indices: Vec<usize>,
    pub marker_found: bool,
}

pub struct CitationExtractor {
    marker: Option<Regex>,
    fence_open: Option<Regex>,
    fence_close: Option<Regex>,
}

impl CitationExtractor {
    pub fn new() -> Self {
        Self {
            marker: Regex::new(r"<!--\s*SOURCES:\s*\[?([0-9,\s]*)\]?\s*-->").ok(),
            fence_open: Regex::new(r"(?m)^```html\s*").ok(),
            fence_close: Regex::new(r"(?m)\s*```$").ok(),
        }
    }

    /// Remove the marker and return the indices it lists that fall within
    /// `[1, block_count]`. Out-of-range or malformed entries are dropped.
    pub fn extract(&self, text: &str, block_count: usize) -> Citations {
        let Some(marker) = &self.marker else {
            return Citations {
                cleaned_text: text.trim().to_string(),
                ..Default::default()
            };
        };

        // The last marker wins if the model emitted more than one.
        let Some(captures) = marker.captures_iter(text).last() else {
            return Citations {
                cleaned_text: text.trim().to_string(),
                ..Default::default()
            };
        };

        let mut used_indices = Vec::new();
        for part in captures[1].split(',') {
            if let Ok(index) = part.trim().parse::<usize>()
                && (1..=block_count).contains(&index)
                && !used_indices.contains(&index)
            {
                used_indices.push(index);
            }
        }

        Citations {
            cleaned_text: marker.replace_all(text, "").trim().to_string(),
            used_indices,
            marker_found: true,
        }
    }

    /// Strip markdown fences wrapping HTML (```` ```html ```` … ```` ``` ````).
    pub fn strip_code_fences(&self, text: &str) -> String {
        let mut out = text.to_string();
        if let Some(open) = &self.fence_open {
            out = open.replace_all(&out, "").into_owned();
        }
        if let Some(close) = &self.fence_close {
            out = close.replace_all(&out, "").into_owned();
        }
        out.trim().to_string()
    }
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Which document indices to show as sources.
///
/// Nothing when there are no documents or the model says the answer is not in
/// them; the marker's indices when it named any; otherwise every block.
pub fn cited_indices(used: &[usize], block_count: usize, asserts_not_found: bool) -> Vec<usize> {
    if asserts_not_found || block_count == 0 {
        return Vec::new();
    }
    if used.is_empty() {
        (1..=block_count).collect()
    } else {
        used.to_vec()
    }
}

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const SOURCES_KEYWORD: &str = "SOURCES";
/// A held span longer than this cannot be a citation marker.
const MAX_HELD: usize = 512;

/// Filters a text stream so a `<!-- SOURCES: … -->` marker never reaches the
/// caller, even when it is split across deltas.
///
/// Ordinary HTML comments pass through. Text is held back only while it could
/// still turn out to be the marker.
#[derive(Debug, Default)]
pub struct MarkerGuard {
    pending: String,
}

impl MarkerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a delta; returns the text safe to forward now.
    pub fn push(&mut self, chunk: &str) -> String {
        self.pending.push_str(chunk);
        let mut out = String::new();

        loop {
            let Some(start) = self.pending.find(COMMENT_OPEN) else {
                let keep = partial_open_suffix(&self.pending);
                let split = self.pending.len() - keep;
                out.extend(self.pending.drain(..split));
                return out;
            };

            out.extend(self.pending.drain(..start));
            let body_start = COMMENT_OPEN.len();

            if !could_be_marker(&self.pending[body_start..]) {
                out.extend(self.pending.drain(..body_start));
                continue;
            }

            match self.pending[body_start..].find(COMMENT_CLOSE) {
                Some(rel) => {
                    self.pending.drain(..body_start + rel + COMMENT_CLOSE.len());
                }
                None if self.pending.len() > MAX_HELD => {
                    out.extend(self.pending.drain(..body_start));
                }
                None => return out,
            }
        }
    }

    /// End of stream: release anything held unless it is an unterminated marker.
    pub fn finish(&mut self) -> String {
        let held = std::mem::take(&mut self.pending);
        match held.strip_prefix(COMMENT_OPEN) {
            Some(body) if could_be_marker(body) => String::new(),
            _ => held,
        }
    }
}

/// Whether a comment body (text after `<!--`) is, or may still become, a
/// SOURCES marker.
fn could_be_marker(body: &str) -> bool {
    let trimmed = body.trim_start();
    if trimmed.len() < SOURCES_KEYWORD.len() {
        SOURCES_KEYWORD.starts_with(trimmed)
    } else {
        trimmed.starts_with(SOURCES_KEYWORD)
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `<!--`.
fn partial_open_suffix(text: &str) -> usize {
    (1..COMMENT_OPEN.len())
        .rev()
        .find(|&k| text.ends_with(&COMMENT_OPEN[..k]))
        .unwrap_or(0)
}
