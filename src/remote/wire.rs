//! JSON shapes returned by the Resolwe REST API.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::types::{
    Collection, CollectionId, DataId, DataObject, Job, JobStatus, Sample, SampleId,
};

/// List endpoints answer either with a bare array or a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum ListWire<T> {
    Plain(Vec<T>),
    Paged {
        results: Vec<T>,
        #[serde(default)]
        next: Option<String>,
    },
}

impl<T> ListWire<T> {
    /// Items on this page and the URL of the following page, if any.
    pub(super) fn into_page(self) -> (Vec<T>, Option<String>) {
        match self {
            Self::Plain(items) => (items, None),
            Self::Paged { results, next } => (results, next.filter(|url| !url.is_empty())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct DataWire {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) slug: String,
    #[serde(default)]
    pub(super) status: String,
    #[serde(default)]
    pub(super) process_type: String,
    #[serde(default)]
    pub(super) parents: Vec<u64>,
    #[serde(default)]
    pub(super) descriptor: Value,
    #[serde(default)]
    pub(super) input: Map<String, Value>,
}

impl DataWire {
    pub(super) fn into_job(self) -> Job {
        Job {
            id: DataId(self.id),
            status: JobStatus::from_code(&self.status),
            type_tag: self.process_type,
            parents: self.parents.into_iter().map(DataId).collect(),
            input: self.input,
        }
    }

    pub(super) fn into_object(self, sample: Option<SampleId>) -> DataObject {
        DataObject {
            id: DataId(self.id),
            slug: self.slug,
            type_tag: self.process_type,
            status: JobStatus::from_code(&self.status),
            parents: self.parents.into_iter().map(DataId).collect(),
            sample,
            descriptor: self.descriptor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct SampleWire {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) name: String,
    #[serde(default)]
    pub(super) descriptor: Value,
}

impl From<SampleWire> for Sample {
    fn from(wire: SampleWire) -> Self {
        Self {
            id: SampleId(wire.id),
            name: wire.name,
            descriptor: wire.descriptor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct CollectionWire {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) name: String,
}

impl From<CollectionWire> for Collection {
    fn from(wire: CollectionWire) -> Self {
        Self {
            id: CollectionId(wire.id),
            name: wire.name,
        }
    }
}
