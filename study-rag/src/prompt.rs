//! Grounded prompt assembly.

use crate::document::RetrievedPassage;

const PREAMBLE: &str = "You are a helpful study assistant. Answer the question using only the context below.\nIf the answer is not in the context, say so clearly.";

const NO_CONTEXT_PREAMBLE: &str = "You are a helpful study assistant. No relevant study material was found for this question.\nTell the user that nothing in the uploaded documents covers it and do not answer from general knowledge.";

/// Renders retrieved passages and a question into one prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    /// Build the prompt. Passages appear in the order given.
    ///
    /// Without passages the context section is left out and the model is
    /// told to report that no material was found.
    pub fn build(&self, passages: &[RetrievedPassage], question: &str) -> String {
        if passages.is_empty() {
            return format!("{NO_CONTEXT_PREAMBLE}\n\nQuestion: {question}\n\nAnswer:");
        }

        let context = passages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n\n");
        format!("{PREAMBLE}\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer:")
    }
}
