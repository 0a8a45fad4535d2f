//! Overlapped write scheduling.
//!
//! Building entry *i + 1* and writing entry *i* touch disjoint state, so
//! the two are allowed to overlap: each bundle's writes are spawned as soon
//! as its build completes while the loop moves on to the next entry. A
//! failed write never aborts later builds; it is collected into the
//! report. A failed build still halts the loop, after pending writes have
//! settled.

use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::Error;
use crate::build::BundleSequence;
use crate::engine::OutputChunk;
use crate::output::{BundleResult, OutputSpec};

/// Outcome of one entry's build-and-write.
#[derive(Debug, Clone)]
pub struct WrittenBundle {
    pub name: String,
    pub entrypoint: String,
    /// Primary chunk per resolved output configuration.
    pub chunks: Vec<OutputChunk>,
    pub build_duration: Duration,
    pub write_duration: Duration,
}

/// Aggregate outcome of a write-while-bundling run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Successfully written bundles, in write-completion order.
    pub written: Vec<WrittenBundle>,
    /// Write failures; the corresponding builds still succeeded.
    pub write_failures: Vec<Error>,
    /// The build failure that halted the sequence, if one occurred.
    /// Bundles built before it are still present in `written` or
    /// `write_failures`.
    pub build_failure: Option<Error>,
}

impl PipelineReport {
    /// True when every entry was built and written.
    pub fn is_success(&self) -> bool {
        self.write_failures.is_empty() && self.build_failure.is_none()
    }
}

/// Drive a sequence to completion, writing each bundle as soon as its build
/// finishes while the next entry builds.
pub async fn write_while_building(
    mut sequence: BundleSequence,
    output: OutputSpec,
) -> PipelineReport {
    let mut writes: JoinSet<std::result::Result<WrittenBundle, Error>> = JoinSet::new();
    let mut report = PipelineReport::default();

    while let Some(next) = sequence.next_bundle().await {
        match next {
            Ok(bundle) => {
                writes.spawn(write_bundle(bundle, output.clone()));
            }
            Err(error) => {
                report.build_failure = Some(error);
                break;
            }
        }
    }

    while let Some(joined) = writes.join_next().await {
        match joined {
            Ok(Ok(written)) => report.written.push(written),
            Ok(Err(error)) => {
                warn!(%error, "bundle write failed");
                report.write_failures.push(error);
            }
            Err(join_error) => {
                report.write_failures.push(Error::Write {
                    entry: "unknown".to_owned(),
                    error: anyhow::anyhow!("write task panicked: {join_error}"),
                });
            }
        }
    }

    report
}

async fn write_bundle(
    bundle: BundleResult,
    output: OutputSpec,
) -> std::result::Result<WrittenBundle, Error> {
    let started = Instant::now();
    let chunks = bundle.write(output).await?;
    let write_duration = started.elapsed();
    info!(
        entry = %bundle.entrypoint(),
        bundled_ms = bundle.stats().duration_ms() as u64,
        written_ms = write_duration.as_millis() as u64,
        "bundle written"
    );
    Ok(WrittenBundle {
        name: bundle.name().to_owned(),
        entrypoint: bundle.entrypoint().to_owned(),
        chunks,
        build_duration: bundle.stats().duration(),
        write_duration,
    })
}
