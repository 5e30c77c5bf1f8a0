//! Demo command implementation.
//!
//! Two simulated devices share an in-memory cloud and go through create,
//! update, delete and a forced full resync after log compaction.

use recordsync_engine::{SyncConfig, SyncReport};
use recordsync_testkit::{Device, InMemoryCloud, Note};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one demo step.
#[derive(Debug, Serialize)]
pub struct StepSummary {
    /// What happened in this step.
    pub step: String,
    /// Remote records inserted locally.
    pub inserted: u64,
    /// Local objects overwritten by newer remote records.
    pub updated: u64,
    /// Local objects deleted.
    pub deleted: u64,
    /// Remote records created or modified.
    pub uploaded: u64,
    /// Change-feed pages fetched.
    pub pages: u32,
    /// Full resyncs after cursor expiry.
    pub cursor_resets: u32,
}

impl StepSummary {
    fn new(step: impl Into<String>, report: &SyncReport) -> Self {
        let step = step.into();
        debug!(step = %step, ?report, "demo step finished");
        Self {
            step,
            inserted: report.inserted,
            updated: report.updated,
            deleted: report.deleted,
            uploaded: report.uploaded(),
            pages: report.pages,
            cursor_resets: report.cursor_resets,
        }
    }
}

/// Demo result.
#[derive(Debug, Serialize)]
pub struct DemoResult {
    /// Steps in order.
    pub steps: Vec<StepSummary>,
    /// Notes on the first device at the end.
    pub device_a: Vec<Note>,
    /// Notes on the second device at the end.
    pub device_b: Vec<Note>,
    /// Records stored in the cloud at the end.
    pub cloud_records: usize,
    /// True if both devices hold the same notes.
    pub converged: bool,
}

/// Runs the demo command.
pub fn run(notes: usize, page_size: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(simulate(notes, page_size))?;

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Runs the scripted scenario.
pub async fn simulate(
    notes: usize,
    page_size: usize,
) -> Result<DemoResult, Box<dyn std::error::Error>> {
    let cloud = Arc::new(InMemoryCloud::new().with_page_size(page_size));
    let config =
        SyncConfig::for_type::<Note>().with_cursor_reset_backoff(Duration::from_millis(50));
    let a = Device::with_config(Arc::clone(&cloud), config.clone());
    let b = Device::with_config(Arc::clone(&cloud), config);
    let mut steps = Vec::new();

    a.engine.prepare_remote().await?;
    steps.push(StepSummary::new("A: initial sync", &a.engine.sync().await?));
    steps.push(StepSummary::new("B: initial sync", &b.engine.sync().await?));

    let mut first = None;
    for i in 0..notes {
        let object = a
            .engine
            .create_object(Note::new(format!("note {}", i + 1), i as i64))
            .await?;
        first.get_or_insert(object.key);
    }
    steps.push(StepSummary::new(
        format!("B: sync after A created {notes} notes"),
        &b.engine.sync().await?,
    ));

    if let Some(key) = first {
        a.engine.update_object(&key, |note| note.done = true).await?;
        steps.push(StepSummary::new(
            "B: sync after A completed a note",
            &b.engine.sync().await?,
        ));
    }

    if let Some(last) = b.store.all().into_iter().max_by_key(|o| o.value.priority) {
        b.engine.delete_object(&last.key).await?;
        steps.push(StepSummary::new(
            "A: sync after B deleted a note",
            &a.engine.sync().await?,
        ));
    }

    a.engine
        .create_object(Note::new("after compaction", -1))
        .await?;
    cloud.compact();
    steps.push(StepSummary::new(
        "B: sync after the cloud compacted its log",
        &b.engine.sync().await?,
    ));
    steps.push(StepSummary::new("A: final sync", &a.engine.sync().await?));

    let device_a = a.notes();
    let device_b = b.notes();
    info!(
        notes = device_a.len(),
        cloud_records = cloud.len(),
        converged = device_a == device_b,
        "demo finished"
    );
    Ok(DemoResult {
        steps,
        converged: device_a == device_b,
        device_a,
        device_b,
        cloud_records: cloud.len(),
    })
}

fn print_text_output(result: &DemoResult) {
    println!("RecordSync Demo");
    println!("===============");
    println!();
    for step in &result.steps {
        println!("{}", step.step);
        println!(
            "  inserted {}, updated {}, deleted {}, uploaded {}, pages {}, cursor resets {}",
            step.inserted,
            step.updated,
            step.deleted,
            step.uploaded,
            step.pages,
            step.cursor_resets
        );
    }

    println!();
    println!("Cloud records: {}", result.cloud_records);
    println!("Device A notes: {}", result.device_a.len());
    for note in &result.device_a {
        let mark = if note.done { "x" } else { " " };
        println!("  [{}] {} (priority {})", mark, note.title, note.priority);
    }
    println!(
        "Converged: {}",
        if result.converged { "yes" } else { "NO" }
    );
}
