//! Schema derived from the ontology subset: declared classes and properties.
//!
//! The schema drives two things: the class/property enumeration embedded in
//! prompts, and the conformance check generated fact batches must pass before
//! they are merged.

use std::collections::HashSet;

use miette::Diagnostic;
use oxigraph::model::{Term, Triple};
use thiserror::Error;

use super::prefixes::Prefixes;
use super::vocab;
use super::{object_iri, subject_iri};

/// Why a triple does not conform to the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SchemaViolation {
    #[error("undefined property {iri}")]
    #[diagnostic(
        code(kg::schema::undefined_property),
        help("Use only properties declared in the ontology (plus rdf:type, rdfs:label, rdfs:comment).")
    )]
    UndefinedProperty { iri: String },

    #[error("undefined class {iri}")]
    #[diagnostic(
        code(kg::schema::undefined_class),
        help("rdf:type must point at a class declared in the ontology.")
    )]
    UndefinedClass { iri: String },

    #[error("rdf:type object must be a class IRI, found {found}")]
    #[diagnostic(code(kg::schema::type_literal))]
    NonIriType { found: String },

    #[error("attempt to redefine schema term {iri}")]
    #[diagnostic(
        code(kg::schema::redefinition),
        help("Generated facts may describe instances only; the ontology is immutable.")
    )]
    SchemaRedefinition { iri: String },
}

/// A declared class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub iri: String,
    pub label: Option<String>,
    pub comment: Option<String>,
}

/// A declared property with optional domain/range hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub iri: String,
    pub label: Option<String>,
    pub comment: Option<String>,
    pub domain: Option<String>,
    pub range: Option<String>,
}

/// Classes and properties declared by an ontology, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    classes: Vec<ClassDef>,
    properties: Vec<PropertyDef>,
    class_index: HashSet<String>,
    property_index: HashSet<String>,
}

/// Predicates every data triple may use regardless of the ontology.
const BUILTIN_PREDICATES: [&str; 3] = [vocab::RDF_TYPE, vocab::RDFS_LABEL, vocab::RDFS_COMMENT];

impl Schema {
    /// Derive the schema from ontology triples.
    pub fn from_triples(triples: &[Triple]) -> Self {
        let mut schema = Self::default();

        for t in triples {
            if t.predicate.as_str() != vocab::RDF_TYPE {
                continue;
            }
            let (Some(subject), Some(kind)) = (subject_iri(t), object_iri(t)) else {
                continue;
            };
            if vocab::CLASS_TYPES.contains(&kind) && schema.class_index.insert(subject.clone()) {
                schema.classes.push(ClassDef {
                    iri: subject,
                    label: None,
                    comment: None,
                });
            } else if vocab::PROPERTY_TYPES.contains(&kind)
                && schema.property_index.insert(subject.clone())
            {
                schema.properties.push(PropertyDef {
                    iri: subject,
                    label: None,
                    comment: None,
                    domain: None,
                    range: None,
                });
            }
        }

        for t in triples {
            let Some(subject) = subject_iri(t) else {
                continue;
            };
            let text = match &t.object {
                Term::Literal(lit) => Some(lit.value().to_string()),
                _ => None,
            };
            let target = object_iri(t).map(str::to_string);
            match t.predicate.as_str() {
                vocab::RDFS_LABEL | vocab::RDFS_COMMENT => {
                    let is_label = t.predicate.as_str() == vocab::RDFS_LABEL;
                    if let Some(class) = schema.classes.iter_mut().find(|c| c.iri == subject) {
                        let slot = if is_label { &mut class.label } else { &mut class.comment };
                        slot.get_or_insert_with(|| text.clone().unwrap_or_default());
                    } else if let Some(prop) = schema.properties.iter_mut().find(|p| p.iri == subject) {
                        let slot = if is_label { &mut prop.label } else { &mut prop.comment };
                        slot.get_or_insert_with(|| text.clone().unwrap_or_default());
                    }
                }
                vocab::RDFS_DOMAIN => {
                    if let Some(prop) = schema.properties.iter_mut().find(|p| p.iri == subject) {
                        prop.domain = prop.domain.take().or(target);
                    }
                }
                vocab::RDFS_RANGE => {
                    if let Some(prop) = schema.properties.iter_mut().find(|p| p.iri == subject) {
                        prop.range = prop.range.take().or(target);
                    }
                }
                _ => {}
            }
        }

        schema
    }

    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn is_class(&self, iri: &str) -> bool {
        self.class_index.contains(iri)
    }

    pub fn is_property(&self, iri: &str) -> bool {
        self.property_index.contains(iri)
    }

    /// Whether the schema declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.properties.is_empty()
    }

    /// Whether a triple belongs to the schema: its subject is a declared class or property.
    pub fn is_schema_triple(&self, triple: &Triple) -> bool {
        subject_iri(triple).is_some_and(|s| self.is_class(&s) || self.is_property(&s))
    }

    /// Check that a data triple only references declared terms.
    pub fn check_triple(&self, triple: &Triple) -> Result<(), SchemaViolation> {
        if let Some(subject) = subject_iri(triple) {
            if self.is_class(&subject) || self.is_property(&subject) {
                return Err(SchemaViolation::SchemaRedefinition { iri: subject });
            }
        }

        let predicate = triple.predicate.as_str();
        if !self.is_property(predicate) && !BUILTIN_PREDICATES.contains(&predicate) {
            return Err(SchemaViolation::UndefinedProperty {
                iri: predicate.to_string(),
            });
        }

        if predicate == vocab::RDF_TYPE {
            match object_iri(triple) {
                Some(class) if self.is_class(class) => {}
                Some(class) => {
                    return Err(SchemaViolation::UndefinedClass {
                        iri: class.to_string(),
                    });
                }
                None => {
                    return Err(SchemaViolation::NonIriType {
                        found: triple.object.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Render the schema for a prompt: prefixes, classes, properties.
    pub fn describe(&self, prefixes: &Prefixes) -> SchemaDescription {
        let classes = self
            .classes
            .iter()
            .map(|c| with_note(prefixes.compact(&c.iri), c.comment.as_deref()))
            .collect();

        let properties = self
            .properties
            .iter()
            .map(|p| {
                let mut line = prefixes.compact(&p.iri);
                match (&p.domain, &p.range) {
                    (Some(d), Some(r)) => {
                        line.push_str(&format!(" ({} -> {})", prefixes.compact(d), prefixes.compact(r)))
                    }
                    (Some(d), None) => line.push_str(&format!(" (on {})", prefixes.compact(d))),
                    (None, Some(r)) => line.push_str(&format!(" (-> {})", prefixes.compact(r))),
                    (None, None) => {}
                }
                with_note(line, p.comment.as_deref())
            })
            .collect();

        SchemaDescription {
            prologue: prefixes.sparql_prologue(),
            classes,
            properties,
        }
    }
}

fn with_note(mut line: String, note: Option<&str>) -> String {
    if let Some(note) = note.filter(|n| !n.is_empty()) {
        line.push_str(": ");
        line.push_str(note);
    }
    line
}

/// Prompt-ready rendering of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescription {
    /// SPARQL `PREFIX` lines.
    pub prologue: String,
    /// One entry per class, e.g. `:Book`.
    pub classes: Vec<String>,
    /// One entry per property, e.g. `:author (:Book -> :Author)`.
    pub properties: Vec<String>,
}

impl SchemaDescription {
    /// Compact comma-separated class list.
    pub fn class_list(&self) -> String {
        self.classes.join(", ")
    }

    /// Compact comma-separated property list.
    pub fn property_list(&self) -> String {
        self.properties.join(", ")
    }
}
