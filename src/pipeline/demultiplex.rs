use std::path::{Path, PathBuf};

use crate::classify::{ClassificationReport, ResultClassifier};
use crate::config::Config;
use crate::polling::PollingMonitor;
use crate::remote::{
    DataObject, DataQuery, Job, JobSubmission, RemoteJobClient, TerminalStatus,
};

use super::PipelineError;

/// Local files for one demultiplexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemultiplexRequest {
    pub reads: PathBuf,
    pub annotation: PathBuf,
}

#[derive(Debug)]
pub enum DemultiplexOutcome {
    /// The demultiplexing job itself ended in error. Nothing was classified.
    PrimaryFailed { job: Job },
    /// Demultiplexing succeeded but sample annotation failed, so samples
    /// could not be assigned to collections.
    AnnotationFailed { job: Job, annotation: Job },
    Classified {
        job: Job,
        report: ClassificationReport,
    },
}

impl DemultiplexOutcome {
    /// Only a failed demultiplexing job fails the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PrimaryFailed { .. } => 1,
            Self::AnnotationFailed { .. } | Self::Classified { .. } => 0,
        }
    }
}

/// Upload, demultiplex, wait, then classify the demultiplexed samples.
pub fn run_demultiplex<C: RemoteJobClient + ?Sized>(
    client: &C,
    config: &Config,
    request: &DemultiplexRequest,
) -> Result<DemultiplexOutcome, PipelineError> {
    for path in [&request.reads, &request.annotation] {
        if !path.is_file() {
            return Err(PipelineError::MissingInput { path: path.clone() });
        }
    }

    let reads = upload(client, &config.processes.upload_reads, &request.reads)?;
    let annotation = upload(client, &config.processes.upload_annotation, &request.annotation)?;

    let submission = JobSubmission::new(&config.processes.demultiplex)
        .input("reads", reads.id.get())
        .input("icount_annotation", annotation.id.get());
    let mut job = client.submit(&submission)?;
    tracing::info!("Submitted demultiplexing job {}", job.id);

    let monitor = PollingMonitor::new(client, config.poll_settings());
    if monitor.await_terminal(&mut job)? == TerminalStatus::Error {
        tracing::error!("Demultiplexing job {} failed", job.id);
        return Ok(DemultiplexOutcome::PrimaryFailed { job });
    }

    let demultiplexed = child_of(client, &job, &config.types.demultiplex_output)?;
    let mut annotation_job = Job::from(child_of(client, &job, &config.types.annotation)?);
    if monitor.await_terminal(&mut annotation_job)? == TerminalStatus::Error {
        tracing::warn!("Sample annotation {} failed", annotation_job.id);
        return Ok(DemultiplexOutcome::AnnotationFailed {
            job,
            annotation: annotation_job,
        });
    }

    let report = ResultClassifier::new(client).classify(demultiplexed.id)?;
    tracing::info!(
        "Classified {} samples ({} failed, {} outputs without a sample)",
        report.assignments.len(),
        report.failures.len(),
        report.skipped
    );
    Ok(DemultiplexOutcome::Classified { job, report })
}

/// Stage `path` and start the upload process. The upload job is not awaited;
/// the demultiplexing job waits on its inputs server-side.
fn upload<C: RemoteJobClient + ?Sized>(
    client: &C,
    process: &str,
    path: &Path,
) -> Result<Job, PipelineError> {
    let staged = client.upload_file(path)?;
    let job = client.submit(&JobSubmission::new(process).input("src", staged.to_input()))?;
    tracing::info!("Uploading {} as job {}", path.display(), job.id);
    Ok(job)
}

fn child_of<C: RemoteJobClient + ?Sized>(
    client: &C,
    job: &Job,
    type_tag: &str,
) -> Result<DataObject, PipelineError> {
    let mut children = client.data(&DataQuery::children_of(job.id).with_type(type_tag))?;
    if children.len() > 1 {
        tracing::warn!(
            "Job {} has {} '{}' outputs; using the first",
            job.id,
            children.len(),
            type_tag
        );
    }
    if children.is_empty() {
        return Err(PipelineError::MissingChild {
            parent: job.id,
            type_tag: type_tag.to_string(),
        });
    }
    Ok(children.swap_remove(0))
}
