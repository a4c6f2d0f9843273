//! Validation and submission of group analyses over a set of samples.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::descriptor::{self, DescriptorError};
use crate::remote::{
    Collection, DataId, DataQuery, Job, JobSubmission, RemoteError, RemoteJobClient, Sample,
    SampleId,
};

pub const GROUP_ANALYSIS_PROCESS: &str = "workflow-icount-group-analysis";
pub const SITES_TYPE: &str = "data:bed:icount:";

/// Organism name to segmentation reference slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTable(BTreeMap<String, String>);

impl ReferenceTable {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    pub fn get(&self, organism: &str) -> Option<&str> {
        self.0.get(organism).map(String::as_str)
    }
}

impl Default for ReferenceTable {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("Homo sapiens".to_string(), "icount-segmentation-hs".to_string()),
            ("Mus musculus".to_string(), "icount-segmentation-mm".to_string()),
        ]))
    }
}

/// Process slug, artifact type and reference table used for group submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSettings {
    pub process: String,
    pub sites_type: String,
    pub references: ReferenceTable,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            process: GROUP_ANALYSIS_PROCESS.to_string(),
            sites_type: SITES_TYPE.to_string(),
            references: ReferenceTable::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("No samples selected, cannot run group analysis")]
    EmptySelection,
    #[error("Cannot read the organism of sample {sample}: {source}")]
    Descriptor {
        sample: SampleId,
        source: DescriptorError,
    },
    #[error(
        "Selected samples belong to multiple species ({}), cannot run group analysis",
        .organisms.join(", ")
    )]
    Heterogeneous { organisms: Vec<String> },
    #[error("No segmentation reference configured for organism '{organism}'")]
    UnmappedOrganism { organism: String },
    #[error("Segmentation reference '{slug}' not found on the server")]
    ReferenceNotFound { slug: String },
    #[error("Sample {sample} has no cross-link sites data")]
    MissingSiteArtifact { sample: SampleId },
    #[error("Sample {sample} has {count} cross-link sites data objects, expected one")]
    AmbiguousSiteArtifact { sample: SampleId, count: usize },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// The single organism shared by every sample, or why there is none.
///
/// Pure: no remote calls are made, so a heterogeneous selection is rejected
/// before anything is submitted.
pub fn common_organism(samples: &[Sample]) -> Result<String, GroupError> {
    if samples.is_empty() {
        return Err(GroupError::EmptySelection);
    }
    let mut organisms = BTreeSet::new();
    for sample in samples {
        let organism = descriptor::lookup_str(&sample.descriptor, descriptor::ORGANISM_PATH)
            .map_err(|source| GroupError::Descriptor {
                sample: sample.id,
                source,
            })?;
        organisms.insert(organism.to_string());
    }
    if organisms.len() != 1 {
        return Err(GroupError::Heterogeneous {
            organisms: organisms.into_iter().collect(),
        });
    }
    organisms
        .pop_first()
        .ok_or(GroupError::EmptySelection)
}

pub struct GroupSubmissionValidator<'a, C: ?Sized> {
    client: &'a C,
    settings: &'a GroupSettings,
}

impl<'a, C: RemoteJobClient + ?Sized> GroupSubmissionValidator<'a, C> {
    pub fn new(client: &'a C, settings: &'a GroupSettings) -> Self {
        Self { client, settings }
    }

    /// Validate `samples` and submit a group analysis named `name` into `collection`.
    ///
    /// The job is not awaited.
    pub fn submit_group(
        &self,
        collection: &Collection,
        samples: &[Sample],
        name: &str,
    ) -> Result<Job, GroupError> {
        let organism = common_organism(samples)?;
        let slug = self
            .settings
            .references
            .get(&organism)
            .ok_or_else(|| GroupError::UnmappedOrganism {
                organism: organism.clone(),
            })?;
        let reference = self.reference(slug)?;

        let mut sites = Vec::with_capacity(samples.len());
        for sample in samples {
            sites.push(self.site_artifact(sample.id)?.get());
        }

        let submission = JobSubmission::new(&self.settings.process)
            .input("sites", sites)
            .input("group_name", name)
            .input("segmentation", reference.get())
            .collection(collection.id);
        let job = self.client.submit(&submission)?;
        tracing::info!(
            "Submitted group analysis '{}' over {} {} samples as job {}",
            name,
            samples.len(),
            organism,
            job.id
        );
        Ok(job)
    }

    fn reference(&self, slug: &str) -> Result<DataId, GroupError> {
        let found = self.client.data(&DataQuery::by_slug(slug))?;
        found
            .first()
            .map(|object| object.id)
            .ok_or_else(|| GroupError::ReferenceNotFound {
                slug: slug.to_string(),
            })
    }

    fn site_artifact(&self, sample: SampleId) -> Result<DataId, GroupError> {
        let query = DataQuery::for_sample(sample).with_type(&self.settings.sites_type);
        let found = self.client.data(&query)?;
        match found.as_slice() {
            [] => Err(GroupError::MissingSiteArtifact { sample }),
            [only] => Ok(only.id),
            many => Err(GroupError::AmbiguousSiteArtifact {
                sample,
                count: many.len(),
            }),
        }
    }
}
