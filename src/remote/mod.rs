//! Capability layer over the remote job execution service.
//!
//! Everything the orchestration engine needs from the service goes through
//! [`RemoteJobClient`]. [`ResolweClient`] talks to a live server over HTTP;
//! [`MemoryRemote`] is a scripted in-process backend for tests and dry runs.

mod memory;
mod query;
mod resolwe;
mod types;
mod wire;

use std::path::{Path, PathBuf};

pub use memory::{MemoryRemote, NewData};
pub use query::{DataQuery, SampleQuery};
pub use resolwe::{Credentials, ResolweClient};
pub use types::{
    Collection, CollectionId, DataId, DataObject, Job, JobStatus, JobSubmission, Sample,
    SampleId, TerminalStatus, UploadedFile,
};

/// Failures raised by remote calls. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("Server returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    /// A create collided with an existing entity.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Synchronous capability to submit jobs and read entities back.
///
/// Every call is a blocking round-trip. Implementations take `&self` so a
/// single client can be shared by every component of a pipeline run.
pub trait RemoteJobClient {
    /// Create a job; the returned handle carries an identifier usable as input elsewhere.
    fn submit(&self, submission: &JobSubmission) -> Result<Job, RemoteError>;

    /// Re-read the job's status from the service, updating the handle in place.
    fn refresh(&self, job: &mut Job) -> Result<(), RemoteError>;

    fn data(&self, query: &DataQuery) -> Result<Vec<DataObject>, RemoteError>;

    fn samples(&self, query: &SampleQuery) -> Result<Vec<Sample>, RemoteError>;

    /// Every collection whose name equals `name`. The service does not keep names unique.
    fn collections(&self, name: &str) -> Result<Vec<Collection>, RemoteError>;

    /// Persist a new collection. A uniqueness collision yields [`RemoteError::Conflict`].
    fn create_collection(&self, name: &str) -> Result<Collection, RemoteError>;

    /// Add samples to a collection. Existing members are left as they are.
    fn add_samples(&self, collection: CollectionId, samples: &[SampleId])
    -> Result<(), RemoteError>;

    /// Stage a local file on the service so it can be passed to an upload process.
    fn upload_file(&self, path: &Path) -> Result<UploadedFile, RemoteError>;
}
