//! Loading triples from Turtle and N-Triples sources.

use std::path::{Path, PathBuf};

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Triple;

use crate::error::{GraphError, GraphResult};

/// Serialization formats accepted for graph sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Turtle,
    NTriples,
}

impl GraphFormat {
    /// Pick the format from a file extension (`.nt` is N-Triples, anything else Turtle).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("nt") => Self::NTriples,
            _ => Self::Turtle,
        }
    }

    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::Turtle => RdfFormat::Turtle,
            Self::NTriples => RdfFormat::NTriples,
        }
    }
}

/// Where a graph's triples come from.
#[derive(Debug, Clone)]
pub enum GraphSource {
    /// A file on disk; the format follows the extension.
    File(PathBuf),
    /// Inline text, e.g. a bundled fixture.
    Text {
        name: String,
        format: GraphFormat,
        body: String,
    },
}

impl GraphSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn turtle(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            format: GraphFormat::Turtle,
            body: body.into(),
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Text { name, .. } => name.clone(),
        }
    }

    /// Read and parse the source.
    pub fn read_triples(&self) -> GraphResult<Vec<Triple>> {
        match self {
            Self::File(path) => {
                let body = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                parse_triples(&body, GraphFormat::from_path(path), &self.name())
            }
            Self::Text { name, format, body } => parse_triples(body, *format, name),
        }
    }
}

/// Parse a document into triples. Named-graph information is discarded.
pub fn parse_triples(body: &str, format: GraphFormat, source_name: &str) -> GraphResult<Vec<Triple>> {
    let mut triples = Vec::new();
    for quad in RdfParser::from_format(format.rdf_format()).for_reader(body.as_bytes()) {
        let quad = quad.map_err(|e| GraphError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(triples)
}
