use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric identifier as stored by the remote service.
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a data object. Jobs are data objects too, so they share this id space.
    DataId
);
numeric_id!(
    /// Identifier of a biological sample.
    SampleId
);
numeric_id!(
    /// Identifier of a named sample collection.
    CollectionId
);

/// Lifecycle state of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Ok,
    Error,
}

impl JobStatus {
    /// Map a Resolwe status code onto the four lifecycle states.
    ///
    /// `DR` (dirty) never progresses without intervention and is folded into `Error`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "OK" => Self::Ok,
            "ER" | "DR" => Self::Error,
            "PR" => Self::Running,
            _ => Self::Pending,
        }
    }

    /// The terminal form of this status, if it is one.
    pub fn terminal(self) -> Option<TerminalStatus> {
        match self {
            Self::Ok => Some(TerminalStatus::Ok),
            Self::Error => Some(TerminalStatus::Error),
            Self::Pending | Self::Running => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Ok => "OK",
            Self::Error => "ERROR",
        })
    }
}

/// A status after which the remote service makes no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalStatus {
    Ok,
    Error,
}

impl From<TerminalStatus> for JobStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Ok => JobStatus::Ok,
            TerminalStatus::Error => JobStatus::Error,
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        JobStatus::from(*self).fmt(f)
    }
}

/// Handle to a submitted remote job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: DataId,
    pub status: JobStatus,
    /// Type tag of the process that produced this job, e.g. `data:demultiplex:icount:`.
    pub type_tag: String,
    pub parents: Vec<DataId>,
    /// Declared inputs, referencing other entities by identifier.
    pub input: Map<String, Value>,
}

/// An artifact produced by a job, optionally attached to a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    pub id: DataId,
    pub slug: String,
    pub type_tag: String,
    pub status: JobStatus,
    pub parents: Vec<DataId>,
    pub sample: Option<SampleId>,
    /// Free-form metadata authored upstream.
    pub descriptor: Value,
}

impl From<DataObject> for Job {
    fn from(object: DataObject) -> Self {
        Self {
            id: object.id,
            status: object.status,
            type_tag: object.type_tag,
            parents: object.parents,
            input: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
    pub descriptor: Value,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "Sample {}", self.id)
        } else {
            write!(f, "Sample {} ({})", self.id, self.name)
        }
    }
}

/// Named grouping of samples. The name is the resolution key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
}

/// A request to run a named process with JSON inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSubmission {
    /// Process slug, e.g. `workflow-icount-demultiplex`.
    pub process: String,
    pub input: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<CollectionId>,
}

impl JobSubmission {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            input: Map::new(),
            collections: Vec::new(),
        }
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    /// Associate the resulting job with a collection.
    pub fn collection(mut self, id: CollectionId) -> Self {
        self.collections.push(id);
        self
    }
}

/// A file staged on the remote service, ready to be referenced as a job input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Original file name.
    pub file: String,
    /// Server-side temporary upload handle.
    pub file_temp: String,
}

impl UploadedFile {
    pub fn to_input(&self) -> Value {
        serde_json::json!({ "file": self.file, "file_temp": self.file_temp })
    }
}
