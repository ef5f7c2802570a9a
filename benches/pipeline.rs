//! Benchmarks for the deterministic pipeline stages.

use std::path::PathBuf;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kg_agent::agent::llm::{LlmError, LlmResult, OutputContract, TextGenerator};
use kg_agent::agent::{Augmenter, Executor};
use kg_agent::graph::{GraphSource, GraphStore, Prefixes};

struct Offline;

impl TextGenerator for Offline {
    fn generate(&self, _prompt: &str, _contract: Option<&OutputContract>) -> LlmResult<String> {
        Err(LlmError::Unavailable {
            url: "offline".into(),
        })
    }

    fn name(&self) -> &str {
        "offline"
    }
}

fn book_store() -> GraphStore {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/books");
    GraphStore::load(
        &GraphSource::file(dir.join("ontology.ttl")),
        Some(&GraphSource::file(dir.join("data.ttl"))),
        Prefixes::standard("http://example.org/ontology/"),
    )
    .unwrap()
}

fn bench_execute(c: &mut Criterion) {
    let store = book_store();
    let executor = Executor::new();
    let query = "SELECT ?authorName WHERE { ?book a :Book ; :title '1984' ; :author ?author . ?author :name ?authorName . }";

    c.bench_function("execute_join", |bench| {
        bench.iter(|| black_box(executor.execute(query, &store)))
    });
}

fn bench_validate(c: &mut Criterion) {
    let store = book_store();
    let augmenter = Augmenter::new(Arc::new(Offline), "hasRecommended");
    let payload = r#":Book4 :hasRecommendedBook :Book1 , :We .
:We a :Book ; :title "We" ; :author :Yevgeny_Zamyatin .
:Yevgeny_Zamyatin a :Author ; :name "Yevgeny Zamyatin" ."#;

    c.bench_function("validate_batch", |bench| {
        bench.iter(|| black_box(augmenter.validate(payload, &store).unwrap()))
    });
}

fn bench_describe(c: &mut Criterion) {
    let store = book_store();
    c.bench_function("describe_schema", |bench| {
        bench.iter(|| black_box(store.schema().describe(store.prefixes())))
    });
}

criterion_group!(benches, bench_execute, bench_validate, bench_describe);
criterion_main!(benches);
