//! Knowledge graph: an oxigraph-backed triple store split into an immutable
//! ontology and a growing data subset.
//!
//! - [`GraphStore`]: the shared store, SPARQL execution and the single-writer merge gate
//! - [`Schema`]: classes and properties declared by the ontology
//! - [`SnapshotWriter`]: append-only, timestamped N-Triples checkpoints
//! - [`parse`]: Turtle / N-Triples loading
//!
//! Triples are `oxigraph::model::Triple` values throughout, so subjects and
//! predicates are IRIs (or blank nodes) and objects may be typed literals.

pub mod parse;
pub mod prefixes;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use oxigraph::model::{Literal, NamedNode, Term, Triple};

pub use parse::{GraphFormat, GraphSource};
pub use prefixes::Prefixes;
pub use schema::{Schema, SchemaViolation};
pub use snapshot::SnapshotWriter;
pub use store::{GraphStore, QueryTable, StoreWriter};

/// IRIs of the vocabulary terms the schema layer understands.
pub mod vocab {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const OWL: &str = "http://www.w3.org/2002/07/owl#";

    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
    pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
    pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
    pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
    pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const OWL_ANNOTATION_PROPERTY: &str = "http://www.w3.org/2002/07/owl#AnnotationProperty";

    /// Types that declare a class.
    pub const CLASS_TYPES: [&str; 2] = [RDFS_CLASS, OWL_CLASS];

    /// Types that declare a property.
    pub const PROPERTY_TYPES: [&str; 4] = [
        RDF_PROPERTY,
        OWL_OBJECT_PROPERTY,
        OWL_DATATYPE_PROPERTY,
        OWL_ANNOTATION_PROPERTY,
    ];
}

/// IRI of a triple's subject, or `None` for blank nodes.
pub(crate) fn subject_iri(triple: &Triple) -> Option<String> {
    // Display renders named nodes as `<iri>` and blank nodes as `_:id`.
    let rendered = triple.subject.to_string();
    rendered
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .map(str::to_string)
}

/// IRI of a triple's object when it is a named node.
pub(crate) fn object_iri(triple: &Triple) -> Option<&str> {
    match &triple.object {
        Term::NamedNode(node) => Some(node.as_str()),
        _ => None,
    }
}

/// Render a triple as one N-Triples statement (without the trailing newline).
pub fn to_ntriples(triple: &Triple) -> String {
    format!("{} {} {} .", triple.subject, triple.predicate, triple.object)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(s).unwrap()
    }

    #[test]
    fn subject_iri_strips_brackets() {
        let t = Triple::new(
            iri("http://example.org/ontology/Book1"),
            iri("http://example.org/ontology/title"),
            Literal::new_simple_literal("1984"),
        );
        assert_eq!(
            subject_iri(&t).as_deref(),
            Some("http://example.org/ontology/Book1")
        );
        assert_eq!(object_iri(&t), None);
    }

    #[test]
    fn ntriples_rendering_is_a_statement() {
        let t = Triple::new(
            iri("http://example.org/ontology/Book1"),
            iri("http://example.org/ontology/author"),
            iri("http://example.org/ontology/A1"),
        );
        let line = to_ntriples(&t);
        assert!(line.starts_with("<http://example.org/ontology/Book1>"));
        assert!(line.ends_with(" ."));
    }
}
