//! Query execution and result normalization.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GraphResult;
use crate::graph::{GraphStore, QueryTable, Term};

/// One solution: bound variables with their display values, in projection
/// order. Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow(pub Vec<(String, String)>);

impl ResultRow {
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(var, _)| var == variable)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(var, value)| (var.as_str(), value.as_str()))
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (var, value) in &self.0 {
            map.serialize_entry(var, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResultRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = ResultRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of variable names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ResultRow, A::Error> {
                let mut row = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, String>()? {
                    row.push(entry);
                }
                Ok(ResultRow(row))
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Ordered rows of one query execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(pub Vec<ResultRow>);

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.0
    }

    /// Compact JSON array, as embedded in the synthesis prompt.
    pub fn to_compact_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".into())
    }

    /// Columns follow `table.variables`; unbound variables are left out.
    fn from_table(table: QueryTable) -> Self {
        let variables = table.variables;
        Self(
            table
                .rows
                .into_iter()
                .map(|mut row| {
                    ResultRow(
                        variables
                            .iter()
                            .filter_map(|var| {
                                row.remove(var).map(|term| (var.clone(), normalize_term(&term)))
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

/// Display form of a bound value.
///
/// IRIs shrink to their last path or fragment segment with `_` read as a
/// space; literals become their lexical form.
pub fn normalize_term(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => {
            let iri = node.as_str();
            let local = iri.rsplit(['/', '#']).next().unwrap_or(iri);
            if local.is_empty() {
                iri.to_string()
            } else {
                local.replace('_', " ")
            }
        }
        Term::Literal(literal) => literal.value().to_string(),
        other => other.to_string(),
    }
}

/// Runs structured queries against a [`GraphStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Execute, keeping execution errors distinct from zero rows.
    pub fn try_execute(&self, query: &str, store: &GraphStore) -> GraphResult<ResultSet> {
        let table = store.query(query)?;
        let results = ResultSet::from_table(table);
        tracing::info!(rows = results.len(), "query executed");
        Ok(results)
    }

    /// Execute, treating any execution error as an empty result set.
    pub fn execute(&self, query: &str, store: &GraphStore) -> ResultSet {
        self.try_execute(query, store).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "query execution failed");
            ResultSet::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSource, Literal, NamedNode, Prefixes};

    const NS: &str = "http://example.org/ontology/";

    fn store() -> GraphStore {
        let ontology = GraphSource::turtle(
            "ontology",
            r#"
            @prefix : <http://example.org/ontology/> .
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            :Book a rdfs:Class .
            :Author a rdfs:Class .
            :title a rdf:Property .
            :author a rdf:Property .
            :name a rdf:Property .
            "#,
        );
        let data = GraphSource::turtle(
            "data",
            r#"
            @prefix : <http://example.org/ontology/> .
            :Book1 a :Book ; :title "1984" ; :author :George_Orwell .
            :George_Orwell a :Author ; :name "George Orwell" .
            "#,
        );
        GraphStore::load(&ontology, Some(&data), Prefixes::standard(NS)).unwrap()
    }

    #[test]
    fn who_wrote_1984() {
        let results = Executor::new().execute(
            "SELECT ?authorName WHERE { ?book :title '1984' ; :author ?author . ?author :name ?authorName . }",
            &store(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results.rows()[0].get("authorName"), Some("George Orwell"));
        assert_eq!(results.to_compact_json(), r#"[{"authorName":"George Orwell"}]"#);
    }

    #[test]
    fn iris_are_shortened() {
        let results = Executor::new().execute("SELECT ?a WHERE { :Book1 :author ?a }", &store());
        assert_eq!(results.rows()[0].get("a"), Some("George Orwell"));
    }

    #[test]
    fn normalization_rules() {
        let hash = Term::NamedNode(NamedNode::new("http://www.w3.org/2000/01/rdf-schema#Class").unwrap());
        assert_eq!(normalize_term(&hash), "Class");
        let trailing = Term::NamedNode(NamedNode::new("http://example.org/").unwrap());
        assert_eq!(normalize_term(&trailing), "http://example.org/");
        let year = Term::Literal(Literal::new_typed_literal(
            "1945",
            NamedNode::new("http://www.w3.org/2001/XMLSchema#gYear").unwrap(),
        ));
        assert_eq!(normalize_term(&year), "1945");
    }

    #[test]
    fn zero_rows_is_ok_and_empty() {
        let results = Executor::new()
            .try_execute("SELECT ?t WHERE { ?b :title ?t ; :author :Nobody }", &store())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn malformed_query_is_distinct_but_coerced() {
        let store = store();
        assert!(Executor::new().try_execute("SELEC ?x WHERE {", &store).is_err());
        assert!(Executor::new().execute("SELEC ?x WHERE {", &store).is_empty());
    }

    #[test]
    fn columns_follow_projection_order() {
        let results = Executor::new().execute(
            "SELECT ?title ?authorName WHERE { ?b :title ?title ; :author ?a . ?a :name ?authorName }",
            &store(),
        );
        let columns: Vec<&str> = results.rows()[0].iter().map(|(var, _)| var).collect();
        assert_eq!(columns, ["title", "authorName"]);
        assert_eq!(
            results.to_compact_json(),
            r#"[{"title":"1984","authorName":"George Orwell"}]"#
        );

        let back: ResultSet = serde_json::from_str(&results.to_compact_json()).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn unbound_optional_is_absent() {
        let results = Executor::new().execute(
            "SELECT ?b ?g WHERE { ?b a :Book OPTIONAL { ?b :genre ?g } }",
            &store(),
        );
        assert_eq!(results.len(), 1);
        assert!(results.rows()[0].get("g").is_none());
    }
}
