//! The shared graph store backed by oxigraph.
//!
//! Holds the immutable ontology subset and the growing data subset in one
//! deduplicating in-memory store. Mutation goes through [`StoreWriter`], a
//! single-writer gate, so that a merge and the re-query that follows it observe
//! exactly one request's augmentation.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use oxigraph::model::{GraphNameRef, Literal, Quad, Term, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::{GraphError, GraphResult};

use super::parse::GraphSource;
use super::prefixes::Prefixes;
use super::schema::Schema;
use super::to_ntriples;

/// Raw result of a SPARQL query: projected variables and one binding map per solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    /// Projected variable names (without `?`), in projection order.
    pub variables: Vec<String>,
    /// Bound values per solution; unbound variables are absent.
    pub rows: Vec<BTreeMap<String, Term>>,
}

/// Knowledge graph store: ontology + data over one oxigraph store.
pub struct GraphStore {
    store: Store,
    ontology: Vec<Triple>,
    ontology_index: HashSet<Triple>,
    schema: Schema,
    prefixes: Prefixes,
    write_gate: Mutex<()>,
}

impl GraphStore {
    /// Build a store from already-parsed ontology and data triples.
    pub fn from_triples(
        ontology: Vec<Triple>,
        data: Vec<Triple>,
        prefixes: Prefixes,
    ) -> GraphResult<Self> {
        let store = Store::new().map_err(|e| GraphError::Storage {
            message: format!("failed to create oxigraph store: {e}"),
        })?;

        let mut ordered = Vec::with_capacity(ontology.len());
        let mut ontology_index = HashSet::with_capacity(ontology.len());
        for triple in ontology {
            if ontology_index.insert(triple.clone()) {
                ordered.push(triple);
            }
        }

        let schema = Schema::from_triples(&ordered);
        let graph = Self {
            store,
            ontology: ordered,
            ontology_index,
            schema,
            prefixes,
            write_gate: Mutex::new(()),
        };

        for triple in &graph.ontology {
            graph.insert_quad(triple)?;
        }
        let mut data_added = 0;
        for triple in &data {
            if !graph.is_ontology(triple) && graph.insert_quad(triple)? {
                data_added += 1;
            }
        }

        tracing::info!(
            ontology = graph.ontology.len(),
            data = data_added,
            classes = graph.schema.classes().len(),
            properties = graph.schema.properties().len(),
            "graph store loaded"
        );
        Ok(graph)
    }

    /// Load the ontology and (optionally) a data source.
    pub fn load(
        ontology: &GraphSource,
        data: Option<&GraphSource>,
        prefixes: Prefixes,
    ) -> GraphResult<Self> {
        let ontology_triples = ontology.read_triples()?;
        let data_triples = match data {
            Some(source) => source.read_triples()?,
            None => Vec::new(),
        };
        let store = Self::from_triples(ontology_triples, data_triples, prefixes)?;
        if store.schema.is_empty() {
            return Err(GraphError::EmptyOntology {
                source_name: ontology.name(),
            });
        }
        Ok(store)
    }

    /// Load a single file holding both schema and facts, splitting it into the
    /// ontology (declarations and every triple about a declared term) and data.
    pub fn load_combined(source: &GraphSource, prefixes: Prefixes) -> GraphResult<Self> {
        let triples = source.read_triples()?;
        let schema = Schema::from_triples(&triples);
        if schema.is_empty() {
            return Err(GraphError::EmptyOntology {
                source_name: source.name(),
            });
        }
        let (ontology, data): (Vec<_>, Vec<_>) =
            triples.into_iter().partition(|t| schema.is_schema_triple(t));
        Self::from_triples(ontology, data, prefixes)
    }

    /// Insert into the default graph. Returns whether the triple was new.
    ///
    /// Callers after load hold the write gate, so the check and the insert
    /// cannot interleave with another writer.
    fn insert_quad(&self, triple: &Triple) -> GraphResult<bool> {
        let quad = default_quad(triple);
        let present = self.store.contains(&quad).map_err(|e| GraphError::Storage {
            message: format!("contains failed: {e}"),
        })?;
        if present {
            return Ok(false);
        }
        self.store.insert(&quad).map_err(|e| GraphError::Storage {
            message: format!("insert failed: {e}"),
        })?;
        Ok(true)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// Ontology triples in load order.
    pub fn ontology(&self) -> &[Triple] {
        &self.ontology
    }

    pub fn ontology_len(&self) -> usize {
        self.ontology.len()
    }

    /// Whether a triple belongs to the immutable ontology subset.
    pub fn is_ontology(&self, triple: &Triple) -> bool {
        self.ontology_index.contains(triple)
    }

    /// Total number of distinct triples (ontology + data).
    pub fn len(&self) -> GraphResult<usize> {
        self.store.len().map_err(|e| GraphError::Storage {
            message: format!("len failed: {e}"),
        })
    }

    pub fn is_empty(&self) -> GraphResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Number of data triples.
    pub fn data_len(&self) -> GraphResult<usize> {
        Ok(self.len()?.saturating_sub(self.ontology.len()))
    }

    pub fn contains(&self, triple: &Triple) -> GraphResult<bool> {
        let quad = default_quad(triple);
        self.store.contains(&quad).map_err(|e| GraphError::Storage {
            message: format!("contains failed: {e}"),
        })
    }

    /// All triples currently in the store (order follows store iteration).
    pub fn triples(&self) -> GraphResult<Vec<Triple>> {
        self.store
            .iter()
            .map(|quad| {
                quad.map(|q| Triple::new(q.subject, q.predicate, q.object))
                    .map_err(|e| GraphError::Storage {
                        message: format!("iteration failed: {e}"),
                    })
            })
            .collect()
    }

    /// Execute a SPARQL SELECT or ASK query against the current state.
    ///
    /// Prefix declarations known to the store are added for any prefix the
    /// query uses without declaring.
    pub fn query(&self, sparql: &str) -> GraphResult<QueryTable> {
        let prepared = self.prefixes.complete_query(sparql);
        let results = self
            .store
            .query(prepared.as_str())
            .map_err(|e| GraphError::Sparql {
                message: e.to_string(),
            })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let variables = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| GraphError::Sparql {
                        message: format!("solution error: {e}"),
                    })?;
                    rows.push(
                        solution
                            .iter()
                            .map(|(var, term)| (var.as_str().to_string(), term.clone()))
                            .collect(),
                    );
                }
                Ok(QueryTable { variables, rows })
            }
            QueryResults::Boolean(b) => Ok(QueryTable {
                variables: vec!["result".to_string()],
                rows: vec![BTreeMap::from([(
                    "result".to_string(),
                    Term::Literal(Literal::from(b)),
                )])],
            }),
            QueryResults::Graph(_) => Err(GraphError::UnsupportedQueryForm {
                form: "CONSTRUCT/DESCRIBE".into(),
            }),
        }
    }

    /// Insert one data triple. Ontology triples are left untouched.
    pub fn insert(&self, triple: &Triple) -> GraphResult<bool> {
        self.writer().insert(triple)
    }

    /// Acquire the single-writer gate.
    pub fn writer(&self) -> StoreWriter<'_> {
        // The gate guards no data of its own; a poisoned lock is still usable.
        let guard = self
            .write_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        StoreWriter {
            graph: self,
            _guard: guard,
        }
    }

    /// Write every triple as N-Triples. Returns the number of statements written.
    pub fn write_ntriples<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        let triples = self.triples().map_err(std::io::Error::other)?;
        for triple in &triples {
            writeln!(out, "{}", to_ntriples(triple))?;
        }
        out.flush()?;
        Ok(triples.len())
    }
}

fn default_quad(triple: &Triple) -> Quad {
    Quad::new(
        triple.subject.clone(),
        triple.predicate.clone(),
        triple.object.clone(),
        GraphNameRef::DefaultGraph,
    )
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("ontology", &self.ontology.len())
            .field("namespace", &self.prefixes.namespace())
            .finish()
    }
}

/// Exclusive write access to a [`GraphStore`].
///
/// Reads through [`StoreWriter::graph`] see the writer's own merges; other
/// writers wait until this one is dropped.
pub struct StoreWriter<'a> {
    graph: &'a GraphStore,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> StoreWriter<'a> {
    /// The store being written.
    pub fn graph(&self) -> &'a GraphStore {
        self.graph
    }

    /// Insert a single data triple. Returns whether it was new.
    pub fn insert(&self, triple: &Triple) -> GraphResult<bool> {
        if self.graph.is_ontology(triple) {
            return Ok(false);
        }
        self.graph.insert_quad(triple)
    }

    /// Set-union a batch into the data subset. Returns how many triples were new.
    pub fn merge(&self, triples: &[Triple]) -> GraphResult<usize> {
        let mut added = 0;
        for triple in triples {
            if self.insert(triple)? {
                added += 1;
            }
        }
        Ok(added)
    }
}
