//! Prefix declarations shared by prompts, query preparation and batch parsing.

use std::sync::LazyLock;

use regex::Regex;

use super::vocab;

/// An ordered set of `prefix -> namespace` declarations.
///
/// The empty prefix (`:`) is the ontology namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    entries: Vec<(String, String)>,
}

static RE_DECLARED_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:@prefix|\bprefix)\s+([A-Za-z][\w.\-]*)?:").unwrap()
});

impl Prefixes {
    /// The standard set: the ontology namespace plus rdf, rdfs, xsd and owl.
    pub fn standard(namespace: &str) -> Self {
        Self {
            entries: vec![
                (String::new(), namespace.to_string()),
                ("rdf".into(), vocab::RDF.into()),
                ("rdfs".into(), vocab::RDFS.into()),
                ("xsd".into(), vocab::XSD.into()),
                ("owl".into(), vocab::OWL.into()),
            ],
        }
    }

    /// Add or replace a declaration.
    pub fn with(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let namespace = namespace.into();
        match self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = namespace,
            None => self.entries.push((prefix, namespace)),
        }
        self
    }

    /// The ontology namespace (the empty prefix).
    pub fn namespace(&self) -> &str {
        self.entries
            .iter()
            .find(|(p, _)| p.is_empty())
            .map(|(_, ns)| ns.as_str())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }

    /// SPARQL prologue lines (`PREFIX : <...>`).
    pub fn sparql_prologue(&self) -> String {
        self.iter()
            .map(|(p, ns)| format!("PREFIX {p}: <{ns}>\n"))
            .collect()
    }

    /// Turtle prelude lines (`@prefix : <...> .`).
    pub fn turtle_prelude(&self) -> String {
        self.iter()
            .map(|(p, ns)| format!("@prefix {p}: <{ns}> .\n"))
            .collect()
    }

    /// Prepend a declaration for every known prefix the query does not declare itself.
    pub fn complete_query(&self, query: &str) -> String {
        let declared: Vec<String> = RE_DECLARED_PREFIX
            .captures_iter(query)
            .map(|c| c.get(1).map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        let mut out = String::new();
        for (prefix, ns) in self.iter() {
            if !declared.iter().any(|d| d == prefix) {
                out.push_str(&format!("PREFIX {prefix}: <{ns}>\n"));
            }
        }
        out.push_str(query);
        out
    }

    /// Compact an IRI to `prefix:local` when a declaration matches.
    pub fn compact(&self, iri: &str) -> String {
        self.entries
            .iter()
            .filter(|(_, ns)| !ns.is_empty())
            .filter_map(|(p, ns)| iri.strip_prefix(ns.as_str()).map(|local| (p, local)))
            .find(|(_, local)| !local.is_empty() && !local.contains(['/', '#']))
            .map(|(p, local)| format!("{p}:{local}"))
            .unwrap_or_else(|| format!("<{iri}>"))
    }
}
