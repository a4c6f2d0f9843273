//! End-to-end flows built from the engine components.
//!
//! Each flow returns a typed outcome; turning that into console output and an
//! exit code is left to the binaries.

mod demultiplex;
mod group_analysis;

use std::path::PathBuf;

pub use demultiplex::{DemultiplexOutcome, DemultiplexRequest, run_demultiplex};
pub use group_analysis::{GroupRequest, run_group_analysis};

use crate::collections::ResolveError;
use crate::group::GroupError;
use crate::polling::PollError;
use crate::remote::{DataId, RemoteError, SampleId};

/// Fatal pipeline failures. Per-item classification problems never end up here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input file {path} does not exist")]
    MissingInput { path: PathBuf },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("Job {parent} finished without a '{type_tag}' output")]
    MissingChild { parent: DataId, type_tag: String },
    #[error(
        "Could not fetch collection '{name}'. Collection either does not exist or multiple \
         collections with the same name were found: {source}"
    )]
    WorkingCollection { name: String, source: ResolveError },
    #[error("Sample {0} does not exist")]
    UnknownSample(SampleId),
    #[error(transparent)]
    Group(#[from] GroupError),
}
