//! The submission pipeline: one submitted RDF document in, one dataset's
//! triple-store graphs and search documents out.
//!
//! Stages run in a fixed order:
//!
//! 1. classify the graph and, for creates, check that no instance already
//!    exists in the dataset graph (no writes happen before this passes)
//! 2. load the dataset description and instances into the dataset graph,
//!    reification statements into the reification graph
//! 3. project instances, a bounded number at a time
//! 4. write the documents through [`IndexWriteCoordinator`], which commits
//!    and refreshes the field schema
//! 5. invalidate downstream caches if the load or the index write changed
//!    anything
//!
//! Nothing is rolled back across stages: a failed index write leaves the
//! triple-store load in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ontodex_core::classify::ClassifiedGraph;
use ontodex_core::error::{IndexWriteError, IndexingError};
use ontodex_core::index::IndexWriteCoordinator;
use ontodex_core::labels::{ChainedLabels, SiblingLabels, StoreLabelLookup};
use ontodex_core::models::{is_blank_node, Graph, IndexDocument};
use ontodex_core::ontology::ANY_SCOPE;
use ontodex_core::project::{Diagnostic, DiagnosticKind, FieldProjector, Projection};
use ontodex_core::store::{GraphLoadCoordinator, GraphStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// The records must not exist yet.
    Create,
    /// Records may already exist; their documents are replaced.
    Update,
}

/// One RDF document submitted for a dataset.
#[derive(Debug, Clone)]
pub struct Submission {
    pub dataset: String,
    pub graph: Graph,
    pub mode: SubmissionMode,
    /// Ontology IRI to resolve predicates in, or [`ANY_SCOPE`].
    pub ontology_scope: String,
}

impl Submission {
    pub fn new(dataset: impl Into<String>, graph: Graph) -> Self {
        Self {
            dataset: dataset.into(),
            graph,
            mode: SubmissionMode::Update,
            ontology_scope: ANY_SCOPE.to_string(),
        }
    }

    pub fn create(mut self) -> Self {
        self.mode = SubmissionMode::Create;
        self
    }

    pub fn scoped_to(mut self, ontology: impl Into<String>) -> Self {
        self.ontology_scope = ontology.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    pub dataset: String,
    pub instances: usize,
    pub statements: usize,
    pub indexed: usize,
    pub skipped_blank: usize,
    pub new_fields: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct IndexingPipeline {
    store: Arc<dyn GraphStore>,
    loader: GraphLoadCoordinator,
    projector: FieldProjector,
    writer: IndexWriteCoordinator,
    workers: usize,
}

impl IndexingPipeline {
    pub fn new(
        store: Arc<dyn GraphStore>,
        projector: FieldProjector,
        writer: IndexWriteCoordinator,
        workers: usize,
    ) -> Self {
        Self {
            loader: GraphLoadCoordinator::new(store.clone()),
            store,
            projector,
            writer,
            workers: workers.max(1),
        }
    }

    pub async fn submit(&self, submission: Submission) -> Result<SubmissionReport, IndexingError> {
        self.run(submission, &AtomicBool::new(false)).await
    }

    /// Run a submission on a detached task.
    ///
    /// Dropping the returned handle does not stop the task; only
    /// [`IndexingTask::cancel`] does, at the next stage boundary.
    pub fn spawn_submission(self: &Arc<Self>, submission: Submission) -> IndexingTask {
        let cancel = CancelHandle::default();
        let pipeline = Arc::clone(self);
        let flag = Arc::clone(&cancel.0);
        let handle = tokio::spawn(async move { pipeline.run(submission, &flag).await });
        IndexingTask { cancel, handle }
    }

    /// Classify and project without writing anything.
    pub async fn dry_run(&self, submission: Submission) -> Vec<Projection> {
        let graph = ClassifiedGraph::new(submission.graph);
        let labels = SiblingLabels::from_graph(graph.graph());
        self.projector
            .project_all(
                &graph,
                &submission.dataset,
                &labels,
                &submission.ontology_scope,
                self.workers,
            )
            .await
    }

    async fn run(
        &self,
        submission: Submission,
        cancelled: &AtomicBool,
    ) -> Result<SubmissionReport, IndexingError> {
        let Submission {
            dataset,
            graph,
            mode,
            ontology_scope,
        } = submission;
        let graph = ClassifiedGraph::new(graph);
        let classification = graph.classification();

        let mut report = SubmissionReport {
            dataset: dataset.clone(),
            instances: classification.instances.len(),
            statements: classification.statements.len(),
            ..Default::default()
        };
        for ignored in &classification.ignored_datasets {
            report.diagnostics.push(Diagnostic::new(
                ignored,
                DiagnosticKind::IgnoredDatasetDescription,
                "additional void:Dataset description was not loaded",
            ));
        }

        // Pre-flight
        if mode == SubmissionMode::Create {
            let subjects: Vec<String> = classification
                .instances
                .iter()
                .filter(|s| !is_blank_node(s))
                .cloned()
                .collect();
            if self.store.any_subject_exists(&dataset, &subjects).await? {
                return Err(IndexingError::Conflict(format!(
                    "records of this submission already exist in dataset <{}>",
                    dataset
                )));
            }
        }
        check(cancelled, "graph load")?;

        // Graph load
        let instances = graph
            .dataset_description()
            .into_iter()
            .chain(graph.instances());
        let loaded = self.loader.load_instances(&dataset, instances).await?;
        let reified = self.loader.load_statements(&dataset, graph.statements()).await?;
        let stored = loaded.triples + reified.triples;
        info!(dataset = %dataset, triples = stored, "graph store load complete");
        check(cancelled, "projection")?;

        // Projection
        let labels = ChainedLabels::new()
            .then(Arc::new(SiblingLabels::from_graph(graph.graph())))
            .then(Arc::new(StoreLabelLookup::new(self.store.clone(), dataset.as_str())));
        let projections = self
            .projector
            .project_all(&graph, &dataset, &labels, &ontology_scope, self.workers)
            .await;
        report.skipped_blank = graph
            .instances()
            .filter(|r| is_blank_node(&r.subject))
            .count();
        let mut documents: Vec<IndexDocument> = Vec::with_capacity(projections.len());
        for projection in projections {
            for diagnostic in &projection.diagnostics {
                warn!(diagnostic = %diagnostic, "projection degraded");
            }
            report.diagnostics.extend(projection.diagnostics);
            documents.push(projection.document);
        }
        check(cancelled, "index write")?;

        // Index write
        let batch = match self.writer.index_batch(&documents).await {
            Ok(batch) => batch,
            Err(IndexingError::IndexWrite(IndexWriteError::Documents { attempted, failures })) => {
                // Accepted documents are committed even when others were rejected.
                if stored > 0 || failures.len() < attempted {
                    self.writer.invalidate_after_write().await;
                }
                return Err(IndexWriteError::Documents { attempted, failures }.into());
            }
            Err(e) => return Err(e),
        };
        report.indexed = batch.indexed;
        report.new_fields = batch.new_fields;

        // Cache invalidation
        if stored > 0 || report.indexed > 0 {
            self.writer.invalidate_after_write().await;
        }

        info!(
            dataset = %report.dataset,
            instances = report.instances,
            statements = report.statements,
            indexed = report.indexed,
            diagnostics = report.diagnostics.len(),
            "submission indexed"
        );
        Ok(report)
    }
}

fn check(cancelled: &AtomicBool, next_stage: &'static str) -> Result<(), IndexingError> {
    if cancelled.load(Ordering::SeqCst) {
        warn!(stage = next_stage, "submission cancelled");
        Err(IndexingError::Cancelled(next_stage))
    } else {
        Ok(())
    }
}

/// Cooperative cancellation flag, checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle on a submission running in the background.
pub struct IndexingTask {
    cancel: CancelHandle,
    handle: JoinHandle<Result<SubmissionReport, IndexingError>>,
}

impl IndexingTask {
    /// Ask the task to stop before its next stage.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the outcome. Submission failures come back as
    /// [`IndexingError`] inside the `anyhow` error.
    pub async fn join(self) -> anyhow::Result<SubmissionReport> {
        let outcome = self.handle.await.context("indexing task panicked")?;
        Ok(outcome?)
    }
}
