//! Result-to-prose synthesis.

use std::sync::Arc;

use super::execute::ResultSet;
use super::llm::TextGenerator;
use super::prompts::synthesis_prompt;

/// Answer for an empty result set.
pub const NO_INFORMATION: &str =
    "I couldn't find any information related to your request in the knowledge graph.";

/// Answer when the generator fails or returns nothing.
pub const SYNTHESIS_FALLBACK: &str = "I couldn't generate a clear answer based on the results.";

/// Turns a result table into a natural language answer.
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Never fails: an empty table short-circuits without a generator call,
    /// and any generator failure yields [`SYNTHESIS_FALLBACK`].
    pub fn synthesize(&self, question: &str, results: &ResultSet) -> String {
        if results.is_empty() {
            return NO_INFORMATION.to_string();
        }

        let prompt = synthesis_prompt(question, &results.to_compact_json());
        match self.generator.generate(&prompt, None) {
            Ok(text) if !text.trim().is_empty() => {
                tracing::debug!(raw = %text, "synthesis output");
                text.trim().to_string()
            }
            Ok(_) => {
                tracing::warn!("synthesis returned blank text");
                SYNTHESIS_FALLBACK.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed");
                SYNTHESIS_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::agent::execute::ResultRow;
    use crate::agent::llm::{LlmError, LlmResult, OutputContract};

    struct Counting {
        calls: AtomicUsize,
        reply: fn(&str) -> LlmResult<String>,
    }

    impl TextGenerator for Counting {
        fn generate(&self, prompt: &str, _contract: Option<&OutputContract>) -> LlmResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)(prompt)
        }
    }

    fn counting(reply: fn(&str) -> LlmResult<String>) -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            reply,
        })
    }

    fn orwell() -> ResultSet {
        ResultSet(vec![ResultRow(vec![(
            "authorName".to_string(),
            "George Orwell".to_string(),
        )])])
    }

    #[test]
    fn empty_results_never_call_generator() {
        let generator = counting(|_| Ok("should not be used".into()));
        let synth = Synthesizer::new(generator.clone());
        assert_eq!(synth.synthesize("Who wrote it?", &ResultSet::default()), NO_INFORMATION);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn answer_is_grounded_in_results() {
        let generator = counting(|prompt| {
            assert!(prompt.contains(r#"[{"authorName":"George Orwell"}]"#));
            Ok("  '1984' was written by George Orwell.\n".into())
        });
        let synth = Synthesizer::new(generator.clone());
        assert_eq!(
            synth.synthesize("Who wrote '1984'?", &orwell()),
            "'1984' was written by George Orwell."
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_and_blank_fall_back() {
        let failing = Synthesizer::new(counting(|_| Err(LlmError::Timeout { timeout_ms: 1 })));
        assert_eq!(failing.synthesize("q", &orwell()), SYNTHESIS_FALLBACK);
        let blank = Synthesizer::new(counting(|_| Ok("   ".into())));
        assert_eq!(blank.synthesize("q", &orwell()), SYNTHESIS_FALLBACK);
    }
}
