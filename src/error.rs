//! Rich diagnostic error types for kg-agent.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. The agent pipeline never
//! lets these escape a request; they surface at startup (loading, configuration)
//! and in the CLI.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::paths::PathError;

/// Top-level error type for kg-agent.
#[derive(Debug, Error, Diagnostic)]
pub enum KgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("failed to read graph source: {path}")]
    #[diagnostic(
        code(kg::graph::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {source_name}: {message}")]
    #[diagnostic(
        code(kg::graph::parse),
        help(
            "The graph source is not valid Turtle / N-Triples. \
             Check prefix declarations and statement terminators."
        )
    )]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("SPARQL query error: {message}")]
    #[diagnostic(
        code(kg::graph::sparql),
        help(
            "The SPARQL query failed. Check the query syntax and that every \
             prefix it uses is declared or known to the store."
        )
    )]
    Sparql { message: String },

    #[error("unsupported query form: {form}")]
    #[diagnostic(
        code(kg::graph::query_form),
        help("Only SELECT and ASK queries produce a result table. Rewrite CONSTRUCT/DESCRIBE as SELECT.")
    )]
    UnsupportedQueryForm { form: String },

    #[error("graph storage error: {message}")]
    #[diagnostic(
        code(kg::graph::storage),
        help("The in-memory oxigraph store reported an internal error.")
    )]
    Storage { message: String },

    #[error("failed to write snapshot: {path}")]
    #[diagnostic(
        code(kg::graph::snapshot),
        help(
            "Snapshots are written with create-new semantics. Check that the \
             snapshot directory exists, is writable, and the disk is not full."
        )
    )]
    Snapshot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("empty ontology: no classes or properties declared in {source_name}")]
    #[diagnostic(
        code(kg::graph::empty_ontology),
        help(
            "The ontology must declare classes (rdfs:Class / owl:Class) and \
             properties (rdf:Property / owl:*Property) so questions can be translated."
        )
    )]
    EmptyOntology { source_name: String },
}

/// Convenience alias for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Convenience alias for functions returning kg-agent results.
pub type KgResult<T> = std::result::Result<T, KgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_kg_error() {
        let err = GraphError::Sparql {
            message: "bad".into(),
        };
        let kg: KgError = err.into();
        assert!(matches!(kg, KgError::Graph(GraphError::Sparql { .. })));
    }

    #[test]
    fn path_error_converts_to_kg_error() {
        let kg: KgError = PathError::NoHome.into();
        assert!(matches!(kg, KgError::Path(PathError::NoHome)));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = GraphError::Parse {
            source_name: "ontology.ttl".into(),
            message: "unexpected end of file".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("ontology.ttl"));
        assert!(msg.contains("unexpected end of file"));
    }
}
