//! Snapshot persistence: one checkpoint per successful merge, never
//! overwritten, and reloadable into an equivalent store.

mod common;

use std::sync::Arc;

use kg_agent::agent::{AgentOptions, KgAgent};
use kg_agent::graph::{GraphSource, GraphStore, Prefixes, SnapshotWriter};

use common::{book_store, ScriptedGenerator, NS, ONTOLOGY_TRIPLES};

const RECOMMEND: &str =
    "SELECT ?title WHERE { :Book4 :hasRecommendedBook ?rec . ?rec :title ?title . }";
const RECOMMEND_FOR_ANIMAL_FARM: &str =
    "SELECT ?title WHERE { :Book2 :hasRecommendedBook ?rec . ?rec :title ?title . }";

fn snapshot_agent(generator: Arc<ScriptedGenerator>, dir: &std::path::Path) -> KgAgent {
    let options = AgentOptions {
        snapshot_dir: Some(dir.to_path_buf()),
        ..Default::default()
    };
    KgAgent::new(Arc::new(book_store()), generator, options)
}

#[test]
fn each_merge_writes_a_new_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = ScriptedGenerator::new()
        .query(RECOMMEND)
        .reply(":Book4 :hasRecommendedBook :Book1 .")
        .reply("Try 1984.")
        .query(RECOMMEND_FOR_ANIMAL_FARM)
        .reply(":Book2 :hasRecommendedBook :Book1 .")
        .reply("Try 1984.");
    let agent = snapshot_agent(generator, dir.path());
    let snapshots = SnapshotWriter::new(dir.path()).unwrap();

    agent.answer("What should I read after Brave New World?");
    let first = snapshots.list().unwrap();
    assert_eq!(first.len(), 1);
    let first_content = std::fs::read_to_string(&first[0]).unwrap();

    agent.answer("What should I read after Animal Farm?");
    let all = snapshots.list().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], first[0]);
    assert_eq!(snapshots.latest().unwrap().as_ref(), Some(&all[1]));

    // The earlier checkpoint is left exactly as written.
    assert_eq!(std::fs::read_to_string(&all[0]).unwrap(), first_content);
    let second_content = std::fs::read_to_string(&all[1]).unwrap();
    assert_eq!(
        second_content.lines().count(),
        first_content.lines().count() + 1
    );
    assert_eq!(second_content.lines().count(), agent.store().len().unwrap());
}

#[test]
fn rejected_batch_writes_no_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = ScriptedGenerator::new()
        .query(RECOMMEND)
        .reply(":Book4 :hasSequel :Book1 .");
    let agent = snapshot_agent(generator, dir.path());

    let response = agent.answer("What should I read after Brave New World?");

    assert_eq!(response.augmentation_applied, Some(false));
    let snapshots = SnapshotWriter::new(dir.path()).unwrap();
    assert!(snapshots.list().unwrap().is_empty());
}

#[test]
fn snapshot_reloads_into_equivalent_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = ScriptedGenerator::new()
        .query(RECOMMEND)
        .reply(":Book4 :hasRecommendedBook :Book1 , :Book2 .")
        .reply("Try 1984 or Animal Farm.");
    let agent = snapshot_agent(generator, dir.path());
    agent.answer("What should I read after Brave New World?");
    let expected = agent.store().len().unwrap();

    let path = SnapshotWriter::new(dir.path())
        .unwrap()
        .latest()
        .unwrap()
        .unwrap();

    // As data on top of the original ontology: ontology triples deduplicate.
    let layered = GraphStore::load(
        &GraphSource::file(common::demo_path("ontology.ttl")),
        Some(&GraphSource::file(&path)),
        Prefixes::standard(NS),
    )
    .unwrap();
    assert_eq!(layered.len().unwrap(), expected);

    // On its own: the schema is recovered from the declarations it contains.
    let combined = GraphStore::load_combined(&GraphSource::file(&path), Prefixes::standard(NS)).unwrap();
    assert_eq!(combined.len().unwrap(), expected);
    assert_eq!(combined.ontology_len(), ONTOLOGY_TRIPLES);

    assert_eq!(combined.query(RECOMMEND).unwrap().rows.len(), 2);
}

#[test]
fn unwritable_snapshot_dir_disables_snapshots() {
    let dir = tempfile::TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "occupied").unwrap();

    let generator = ScriptedGenerator::new()
        .query(RECOMMEND)
        .reply(":Book4 :hasRecommendedBook :Book1 .")
        .reply("Try 1984.");
    let agent = snapshot_agent(generator, &blocker.join("snapshots"));

    // The merge still lands; only the checkpoint is skipped.
    let response = agent.answer("What should I read after Brave New World?");
    assert_eq!(response.augmentation_applied, Some(true));
    assert_eq!(response.agent_response, "Try 1984.");
}

#[test]
fn agent_debug_names_snapshot_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let agent = snapshot_agent(ScriptedGenerator::new(), dir.path());
    let rendered = format!("{agent:?}");
    assert!(rendered.contains(&dir.path().display().to_string()), "{rendered}");

    let plain = KgAgent::new(Arc::new(book_store()), ScriptedGenerator::new(), AgentOptions::default());
    assert!(format!("{plain:?}").contains("snapshots: None"));
}
