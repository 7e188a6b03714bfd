//! Turns surviving candidates into numbered, length-budgeted prompt context.

use crate::types::{ContextBlock, RetrievalCandidate};

/// Text the model sees when nothing survived retrieval.
pub const NO_DOCUMENTS_TEXT: &str = "No relevant documents found.";

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    per_document_chars: usize,
}

impl ContextAssembler {
    pub fn new(per_document_chars: usize) -> Self {
        Self { per_document_chars }
    }

    /// Number candidates from 1 in their given order, truncating each body.
    ///
    /// Candidates with empty content are skipped. Never returns an empty
    /// sequence: no input yields a single [`ContextBlock::NoRelevantDocuments`].
    pub fn assemble(&self, candidates: &[RetrievalCandidate]) -> Vec<ContextBlock> {
        let blocks: Vec<ContextBlock> = candidates
            .iter()
            .filter(|c| !c.raw_content.is_empty())
            .enumerate()
            .map(|(i, c)| ContextBlock::Document {
                index: i + 1,
                title: c.title.clone(),
                content: truncate_chars(&c.raw_content, self.per_document_chars).to_string(),
            })
            .collect();

        if blocks.is_empty() {
            vec![ContextBlock::NoRelevantDocuments]
        } else {
            blocks
        }
    }

    /// Render blocks as `[DOCUMENT i: title]` sections separated by blank lines.
    pub fn render(blocks: &[ContextBlock]) -> String {
        blocks
            .iter()
            .map(|block| match block {
                ContextBlock::Document {
                    index,
                    title,
                    content,
                } => format!("[DOCUMENT {index}: {title}]\n{content}"),
                ContextBlock::NoRelevantDocuments => NO_DOCUMENTS_TEXT.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(8000)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
