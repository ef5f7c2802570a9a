// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kg-agent
//!
//! A natural-language question-answering agent over an RDF knowledge graph.
//!
//! ## Architecture
//!
//! - **Knowledge graph** (`graph`): oxigraph store split into an immutable ontology and growing data
//! - **Translation** (`agent::translate`): question → SPARQL through a constrained LLM call
//! - **Execution** (`agent::execute`): SPARQL → normalized result rows
//! - **Augmentation** (`agent::augment`): on empty results, generate, validate and merge new facts
//! - **Synthesis** (`agent::synthesize`): result rows → grounded natural language answer
//! - **Providers** (`agent::llm`): Gemini and Ollama behind one `TextGenerator` trait, with timeouts
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kg_agent::agent::{AgentOptions, KgAgent};
//! use kg_agent::config::AgentConfig;
//! use kg_agent::graph::{GraphSource, GraphStore};
//!
//! let config = AgentConfig::default();
//! let store = GraphStore::load(
//!     &GraphSource::file("demos/books/ontology.ttl"),
//!     Some(&GraphSource::file("demos/books/data.ttl")),
//!     config.graph.prefixes(),
//! )
//! .unwrap();
//! let generator = kg_agent::agent::llm::from_config(&config.llm).unwrap();
//! let agent = KgAgent::new(Arc::new(store), generator, AgentOptions::default());
//! println!("{}", agent.answer("Who wrote '1984'?").agent_response);
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod paths;
