//! Agent layer: the four-stage question-answering pipeline.
//!
//! - **Translate** a question into SPARQL ([`Translator`])
//! - **Execute** it against the graph ([`Executor`])
//! - **Augment** the graph when nothing matched ([`Augmenter`])
//! - **Synthesize** an answer from the rows ([`Synthesizer`])
//!
//! [`KgAgent`] wires the stages together. Every generative call goes through
//! [`llm::TextGenerator`], so the pipeline runs unchanged against a real
//! provider or a scripted fake.

pub mod augment;
pub mod execute;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod synthesize;
pub mod translate;

pub use augment::{AugmentOutcome, Augmenter, FactBatch, ValidationError};
pub use execute::{Executor, ResultRow, ResultSet};
pub use llm::{LlmError, OutputContract, TextGenerator};
pub use pipeline::{AgentOptions, AgentResponse, AgentStats, KgAgent, StatsSnapshot};
pub use prompts::FewShotExample;
pub use synthesize::Synthesizer;
pub use translate::{StructuredQuery, Translator};
