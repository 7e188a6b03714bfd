//! Prompt construction for one turn.

use crate::context::ContextAssembler;
use crate::types::ContextBlock;

pub const SYSTEM_PROMPT: &str = "\
You are a legal document assistant. You answer questions about the user's uploaded \
documents and, when asked to act on records, you may call the legal practice tools \
provided to you.

Answering from documents:
1. Use ONLY information stated in the supplied documents. Never infer, calculate, or assume.
2. If the information is not in the documents, say: 'This information is not provided in the documents.'
3. Stay consistent with earlier answers in this conversation.
4. Quote exact values (amounts, dates, names, identifiers) as they appear.
5. Mention which document each fact came from.
6. End every answer with an HTML comment listing the document numbers you used, e.g. <!-- SOURCES: 1,2 -->

Using tools:
- Questions about document content never need tools.
- Use tools only to create, update, or look up records in the practice systems, to \
estimate fees, to generate invoices, or to send notifications.

Formatting:
- Reply with clean HTML (<p>, <ul>, <li>, <strong>). Never wrap it in ```html code blocks.";

pub const DOCUMENT_QUESTION_DIRECTIVE: &str = "\
IMPORTANT: This is a document content question. Answer from the documents supplied \
below and do not call any tools.";

/// Builds the system and user prompts for a turn.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self, document_question: bool) -> String {
        if document_question {
            format!("{}\n\n{}", self.system_prompt, DOCUMENT_QUESTION_DIRECTIVE)
        } else {
            self.system_prompt.clone()
        }
    }

    pub fn user_prompt(&self, question: &str, blocks: &[ContextBlock], document_question: bool) -> String {
        let context = ContextAssembler::render(blocks);
        let instructions = if document_question {
            "IMPORTANT:\n\
             1. Answer using ONLY the document content above. Do not call any tools.\n\
             2. State which document(s) the information came from.\n\
             3. If the requested information is not explicitly stated, say so.\n\
             4. End with an HTML comment listing the document numbers used, like <!-- SOURCES: 1,2 -->"
        } else {
            "Cite the documents you rely on, and end with an HTML comment listing their \
             numbers, like <!-- SOURCES: 1,2 -->. Return only HTML, no markdown code blocks."
        };
        format!("Based on these documents:\n\n{context}\n\nUser question: {question}\n\n{instructions}")
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
