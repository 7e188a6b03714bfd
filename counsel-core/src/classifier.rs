//! Swappable text heuristics used by the engine.
//!
//! Both classifiers are plain phrase matchers by default. They sit behind
//! traits so a better model can replace them without touching orchestration.

/// Decides whether a query asks about document content (as opposed to an
/// action such as creating a case).
pub trait QueryClassifier: Send + Sync {
    fn is_document_question(&self, query: &str) -> bool;
}

/// Decides whether an answer claims the requested information is absent.
pub trait AnswerClassifier: Send + Sync {
    fn asserts_not_found(&self, answer: &str) -> bool;
}

const DOCUMENT_QUESTION_PHRASES: &[&str] = &[
    "summarize",
    "what does",
    "analyze",
    "review",
    "explain",
    "find in",
    "extract from",
    "show me from",
    "according to",
    "in the document",
    "in the nda",
    "in the contract",
    "in the agreement",
    "in the policy",
    "confidentiality",
    "obligations",
    "terms",
    "provisions",
    "clauses",
];

const NOT_FOUND_PHRASES: &[&str] = &[
    "not mentioned",
    "not found",
    "no information",
    "does not contain",
    "is not in",
    "not included",
    "not present",
    "doesn't mention",
    "no reference to",
    "not provided",
];

/// Case-insensitive substring match against a phrase list.
#[derive(Debug, Clone)]
pub struct KeywordQueryClassifier {
    phrases: Vec<String>,
}

impl KeywordQueryClassifier {
    pub fn new() -> Self {
        Self::with_phrases(DOCUMENT_QUESTION_PHRASES.iter().copied())
    }

    pub fn with_phrases<'a>(phrases: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            phrases: phrases.into_iter().map(str::to_lowercase).collect(),
        }
    }
}

impl Default for KeywordQueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClassifier for KeywordQueryClassifier {
    fn is_document_question(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct NotFoundPhraseClassifier {
    phrases: Vec<String>,
}

impl NotFoundPhraseClassifier {
    pub fn new() -> Self {
        Self {
            phrases: NOT_FOUND_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for NotFoundPhraseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerClassifier for NotFoundPhraseClassifier {
    fn asserts_not_found(&self, answer: &str) -> bool {
        let lowered = answer.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_questions() {
        let c = KeywordQueryClassifier::new();
        assert!(c.is_document_question("Summarize the NDA"));
        assert!(c.is_document_question("What are the payment TERMS?"));
        assert!(c.is_document_question("what does section 4 say"));
        assert!(!c.is_document_question("Create a new case for Acme"));
        assert!(!c.is_document_question("Email the client"));
    }

    #[test]
    fn test_custom_phrases() {
        let c = KeywordQueryClassifier::with_phrases(["Invoice"]);
        assert!(c.is_document_question("show invoice"));
        assert!(!c.is_document_question("summarize"));
    }

    #[test]
    fn test_not_found_answers() {
        let c = NotFoundPhraseClassifier::new();
        assert!(c.asserts_not_found("This information is not provided in the documents."));
        assert!(c.asserts_not_found("The contract doesn't mention a termination fee."));
        assert!(c.asserts_not_found("NOT FOUND"));
        assert!(!c.asserts_not_found("The hourly rate is $350."));
    }
}
