//! `odx index` and `odx project`: read an RDF file and push it through the
//! pipeline, or project it without writing.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::Config;
use crate::engine::build_engine;
use crate::pipeline::{Submission, SubmissionReport};
use crate::rdf_input::{parse_graph, InputFormat};

pub struct IndexOptions {
    pub format: Option<InputFormat>,
    pub create: bool,
    pub scope: Option<String>,
    pub background: bool,
}

fn read_submission(
    file: &Path,
    dataset: &str,
    format: Option<InputFormat>,
    scope: Option<String>,
) -> Result<Submission> {
    let format = format.unwrap_or_else(|| InputFormat::from_path(file));
    let reader = File::open(file)
        .with_context(|| format!("Failed to open RDF file: {}", file.display()))?;
    let graph = parse_graph(BufReader::new(reader), format)?;
    let mut submission = Submission::new(dataset, graph);
    if let Some(scope) = scope {
        submission = submission.scoped_to(scope);
    }
    Ok(submission)
}

pub async fn run_index(config: &Config, file: &Path, dataset: &str, opts: IndexOptions) -> Result<()> {
    let mut submission = read_submission(file, dataset, opts.format, opts.scope)?;
    if opts.create {
        submission = submission.create();
    }

    let engine = build_engine(config).await?;
    let report = if opts.background {
        let task = engine.pipeline.spawn_submission(submission);
        let cancel = task.cancel_handle();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling after the current stage...");
                cancel.cancel();
            }
        });
        let outcome = task.join().await;
        watcher.abort();
        outcome
    } else {
        engine
            .pipeline
            .submit(submission)
            .await
            .map_err(anyhow::Error::from)
    };
    engine.close().await;

    print_report(&report?);
    Ok(())
}

fn print_report(report: &SubmissionReport) {
    println!("Indexed dataset <{}>", report.dataset);
    println!("  instances:     {}", report.instances);
    println!("  statements:    {}", report.statements);
    println!("  documents:     {}", report.indexed);
    if report.skipped_blank > 0 {
        println!("  blank skipped: {}", report.skipped_blank);
    }
    if !report.new_fields.is_empty() {
        println!("  new fields:    {}", report.new_fields.join(", "));
    }
    if !report.diagnostics.is_empty() {
        println!("  diagnostics:   {}", report.diagnostics.len());
        for d in &report.diagnostics {
            println!("    {}", d);
        }
    }
}

pub async fn run_project(
    config: &Config,
    file: &Path,
    dataset: &str,
    format: Option<InputFormat>,
    scope: Option<String>,
) -> Result<()> {
    let submission = read_submission(file, dataset, format, scope)?;
    let engine = build_engine(config).await?;
    let projections = engine.pipeline.dry_run(submission).await;
    engine.close().await;

    let out: Vec<serde_json::Value> = projections
        .iter()
        .map(|p| {
            json!({
                "document": p.document,
                "diagnostics": p.diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
