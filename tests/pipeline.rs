use std::sync::Arc;

use ontodex::pipeline::{IndexingPipeline, Submission};
use ontodex::rdf_input::{parse_str, InputFormat};
use ontodex_core::cache::{CacheInvalidator, CacheRegion, RecordingInvalidator};
use ontodex_core::error::{IndexWriteError, IndexingError};
use ontodex_core::fields::{self, encode_predicate};
use ontodex_core::index::{IndexWriteCoordinator, MemoryDocumentIndex};
use ontodex_core::ontology::{
    CachedClassHierarchy, CachedPropertyResolver, MemoryOntology, OntologySnapshot,
    PropertyDescription,
};
use ontodex_core::project::{DiagnosticKind, FieldProjector, ProjectionConfig};
use ontodex_core::store::{reification_graph, LoadStrategy, MemoryGraphStore};
use ontodex_core::vocab::{OWL_THING, XSD_FLOAT};

const DS: &str = "http://ex.org/datasets/devices/";
const ONTO: &str = "http://ex.org/onto/";
const WEIGHT: &str = "http://ex.org/weight";

const WIDGET_TTL: &str = r#"
@prefix ex: <http://ex.org/> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

ex:Widget1 a ex:Widget ;
    rdfs:label "Widget One"@en ;
    ex:weight "12.5"^^xsd:float .
"#;

struct Harness {
    store: Arc<MemoryGraphStore>,
    index: Arc<MemoryDocumentIndex>,
    invalidator: Arc<RecordingInvalidator>,
    pipeline: Arc<IndexingPipeline>,
}

fn snapshot() -> OntologySnapshot {
    OntologySnapshot::default()
        .with_class(ONTO, "http://ex.org/Widget", &["http://ex.org/Device"])
        .with_class(ONTO, "http://ex.org/Device", &[OWL_THING])
        .with_property(
            ONTO,
            WEIGHT,
            PropertyDescription {
                max_cardinality: Some(1),
                range: vec![XSD_FLOAT.to_string()],
                ..Default::default()
            },
        )
}

fn harness_with(store: MemoryGraphStore, index: MemoryDocumentIndex) -> Harness {
    let store = Arc::new(store);
    let index = Arc::new(index);
    let invalidator = Arc::new(RecordingInvalidator::new());
    let onto = Arc::new(MemoryOntology::new(snapshot()));
    let classes = Arc::new(CachedClassHierarchy::new(onto.clone(), OWL_THING));
    let properties = Arc::new(CachedPropertyResolver::new(onto, classes.clone()));
    let projector = FieldProjector::new(
        ProjectionConfig::new(vec!["en".into()], false),
        properties,
        classes,
    );
    let writer = IndexWriteCoordinator::new(
        index.clone(),
        invalidator.clone() as Arc<dyn CacheInvalidator>,
        false,
    );
    let pipeline = Arc::new(IndexingPipeline::new(store.clone(), projector, writer, 4));
    Harness {
        store,
        index,
        invalidator,
        pipeline,
    }
}

fn harness() -> Harness {
    harness_with(MemoryGraphStore::new(), MemoryDocumentIndex::new())
}

fn submission(ttl: &str) -> Submission {
    Submission::new(DS, parse_str(ttl, InputFormat::Turtle).unwrap())
}

#[tokio::test]
async fn test_widget_submission_end_to_end() {
    let h = harness();
    let report = h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap();

    assert_eq!(report.dataset, DS);
    assert_eq!(report.instances, 1);
    assert_eq!(report.indexed, 1);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert!(report.new_fields.iter().any(|f| f == "prefLabel_en"));

    let doc = h.index.find_by_uri("http://ex.org/Widget1").unwrap();
    assert_eq!(doc.dataset, DS);
    assert_eq!(doc.first("prefLabel_en"), Some("Widget One"));
    assert_eq!(
        doc.first(&format!("{}_attr_float_single_valued", encode_predicate(WEIGHT))),
        Some("12.5")
    );
    assert_eq!(
        doc.values(fields::INFERRED_TYPE),
        vec!["http://ex.org/Widget", "http://ex.org/Device", OWL_THING]
    );

    assert_eq!(h.store.triples(DS).len(), 3);
    assert_eq!(h.index.commits(), 1);
    assert_eq!(h.index.schema_refreshes(), 1);
}

#[tokio::test]
async fn test_caches_invalidated_after_write() {
    let h = harness();
    h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap();

    let seen = h.invalidator.seen();
    for region in CacheRegion::AFTER_WRITE {
        assert!(seen.contains(&region), "{} not invalidated", region);
    }
    assert!(!seen.contains(&CacheRegion::ClassHierarchy));
}

#[tokio::test]
async fn test_caches_invalidated_when_no_document_is_produced() {
    let ttl = r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix void: <http://rdfs.org/ns/void#> .

<http://ex.org/datasets/devices/> a void:Dataset ;
    rdfs:label "Devices" .
_:b1 rdfs:label "anon" .
"#;
    let h = harness();
    let report = h.pipeline.submit(submission(ttl)).await.unwrap();

    assert_eq!(report.indexed, 0);
    assert_eq!(report.skipped_blank, 1);
    assert!(h.index.is_empty());
    assert!(!h.store.triples(DS).is_empty());

    let seen = h.invalidator.seen();
    for region in CacheRegion::AFTER_WRITE {
        assert!(seen.contains(&region), "{} not invalidated", region);
    }
}

#[tokio::test]
async fn test_dataset_description_and_reification_graphs() {
    let ttl = r#"
@prefix ex: <http://ex.org/> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix void: <http://rdfs.org/ns/void#> .

<http://ex.org/datasets/devices/> a void:Dataset ;
    ex:title "Devices" .

ex:Widget1 a ex:Widget ;
    ex:maker ex:Acme .

ex:stmt1 a rdf:Statement ;
    rdf:subject ex:Widget1 ;
    rdf:predicate ex:maker ;
    rdf:object ex:Acme ;
    ex:note "since 2001" .
"#;
    let h = harness();
    let report = h.pipeline.submit(submission(ttl)).await.unwrap();

    assert_eq!(report.instances, 1);
    assert_eq!(report.statements, 1);
    assert_eq!(h.index.len(), 1);

    let dataset_graph = h.store.triples(DS);
    assert!(dataset_graph
        .iter()
        .any(|t| t.subject == "http://ex.org/datasets/devices/"));
    assert!(dataset_graph.iter().all(|t| t.subject != "http://ex.org/stmt1"));

    let reified = h.store.triples(&reification_graph(DS));
    assert_eq!(reified.len(), 5);

    let doc = h.index.find_by_uri("http://ex.org/Widget1").unwrap();
    let note = encode_predicate("http://ex.org/note");
    assert!(doc.has_value(&format!("{}_reify_attr", note), "http://ex.org/maker"));
    assert!(doc.has_value(&format!("{}_reify_obj", note), "http://ex.org/Acme"));
}

#[tokio::test]
async fn test_extra_dataset_description_is_reported() {
    let ttl = r#"
@prefix ex: <http://ex.org/> .
@prefix void: <http://rdfs.org/ns/void#> .

ex:first a void:Dataset .
ex:second a void:Dataset .
ex:Widget1 a ex:Widget .
"#;
    let h = harness();
    let report = h.pipeline.submit(submission(ttl)).await.unwrap();

    let ignored: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::IgnoredDatasetDescription)
        .collect();
    assert_eq!(ignored.len(), 1);
    assert_eq!(report.indexed, 1);
}

#[tokio::test]
async fn test_create_conflicts_with_existing_records() {
    let h = harness();
    h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap();
    let loads = h.store.load_calls();

    let err = h
        .pipeline
        .submit(submission(WIDGET_TTL).create())
        .await
        .unwrap_err();
    assert!(matches!(err, IndexingError::Conflict(_)), "{:?}", err);
    assert!(err.is_client_error());
    assert_eq!(h.store.load_calls(), loads);
    assert_eq!(h.index.commits(), 1);
}

#[tokio::test]
async fn test_create_into_empty_dataset() {
    let h = harness();
    let report = h
        .pipeline
        .submit(submission(WIDGET_TTL).create())
        .await
        .unwrap();
    assert_eq!(report.indexed, 1);
}

#[tokio::test]
async fn test_update_replaces_document() {
    let h = harness();
    h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap();
    let changed = WIDGET_TTL.replace("Widget One", "Widget Uno");
    h.pipeline.submit(submission(&changed)).await.unwrap();

    assert_eq!(h.index.len(), 1);
    let doc = h.index.find_by_uri("http://ex.org/Widget1").unwrap();
    assert_eq!(doc.first("prefLabel_en"), Some("Widget Uno"));
}

#[tokio::test]
async fn test_store_failure_stops_before_indexing() {
    let h = harness();
    h.store.fail_load_call(1);

    let err = h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap_err();
    assert!(matches!(err, IndexingError::StoreWrite(_)), "{:?}", err);
    assert!(!err.is_client_error());
    assert!(h.index.is_empty());
    assert!(h.invalidator.seen().is_empty());
}

#[tokio::test]
async fn test_incremental_chunk_failure_keeps_earlier_chunks() {
    let ttl = r#"
@prefix ex: <http://ex.org/> .
ex:a a ex:Widget .
ex:b a ex:Widget .
ex:c a ex:Widget .
"#;
    let h = harness_with(
        MemoryGraphStore::new().with_strategy(LoadStrategy::Incremental { chunk_size: 1 }),
        MemoryDocumentIndex::new(),
    );
    h.store.fail_load_call(2);

    let err = h.pipeline.submit(submission(ttl)).await.unwrap_err();
    assert!(matches!(err, IndexingError::StoreWrite(_)));
    assert_eq!(h.store.triples(DS).len(), 1);
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn test_index_rejection_keeps_graph_load() {
    let index = MemoryDocumentIndex::new();
    index.reject("http://ex.org/Widget1");
    let h = harness_with(MemoryGraphStore::new(), index);

    let err = h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap_err();
    assert!(
        matches!(err, IndexingError::IndexWrite(IndexWriteError::Documents { .. })),
        "{:?}",
        err
    );
    assert_eq!(h.store.triples(DS).len(), 3);
    // The graph load still happened, so cached reads are stale.
    assert!(h.invalidator.seen().contains(&CacheRegion::Sparql));
}

#[tokio::test]
async fn test_schema_refresh_failure_fails_submission() {
    let index = MemoryDocumentIndex::new();
    index.fail_schema_refresh();
    let h = harness_with(MemoryGraphStore::new(), index);

    let err = h.pipeline.submit(submission(WIDGET_TTL)).await.unwrap_err();
    assert!(matches!(err, IndexingError::SchemaUpdate(_)), "{:?}", err);
}

#[tokio::test]
async fn test_blank_instances_are_not_indexed() {
    let ttl = r#"
@prefix ex: <http://ex.org/> .
ex:Widget1 a ex:Widget ;
    ex:part [ a ex:Part ] .
"#;
    let h = harness();
    let report = h.pipeline.submit(submission(ttl)).await.unwrap();

    assert_eq!(report.instances, 2);
    assert_eq!(report.skipped_blank, 1);
    assert_eq!(report.indexed, 1);
    assert_eq!(h.index.len(), 1);
}

#[tokio::test]
async fn test_reference_labels_come_from_the_store() {
    let h = harness();
    let acme = r#"
@prefix ex: <http://ex.org/> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
ex:Acme a ex:Company ;
    rdfs:label "Acme Corp"@en .
"#;
    h.pipeline.submit(submission(acme)).await.unwrap();

    let widget = r#"
@prefix ex: <http://ex.org/> .
ex:Widget2 a ex:Widget ;
    ex:maker ex:Acme .
"#;
    h.pipeline.submit(submission(widget)).await.unwrap();

    let doc = h.index.find_by_uri("http://ex.org/Widget2").unwrap();
    let maker = encode_predicate("http://ex.org/maker");
    assert!(doc.has_value(&format!("{}_attr_obj_en", maker), "Acme Corp"));
    assert!(doc.has_value(&format!("{}_attr_obj_uri", maker), "http://ex.org/Acme"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let h = harness();
    let projections = h.pipeline.dry_run(submission(WIDGET_TTL)).await;

    assert_eq!(projections.len(), 1);
    assert_eq!(projections[0].document.uri, "http://ex.org/Widget1");
    assert_eq!(h.store.load_calls(), 0);
    assert!(h.index.is_empty());
    assert!(h.invalidator.seen().is_empty());
}

#[tokio::test]
async fn test_background_submission_completes() {
    let h = harness();
    let task = h.pipeline.spawn_submission(submission(WIDGET_TTL));
    let report = task.join().await.unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(h.index.len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_graph_load() {
    let h = harness();
    let task = h.pipeline.spawn_submission(submission(WIDGET_TTL));
    task.cancel();

    let err = task.join().await.unwrap_err();
    let err = err.downcast_ref::<IndexingError>().unwrap();
    assert!(matches!(err, IndexingError::Cancelled("graph load")), "{:?}", err);
    assert_eq!(h.store.load_calls(), 0);
    assert!(h.index.is_empty());
}
