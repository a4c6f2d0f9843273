//! Fan-out of a finished job's outputs into experiment collections.
//!
//! Each output object attached to a sample is filed into the collection named
//! by its descriptor's experiment label. A problem with one object is recorded
//! and the batch moves on; assignments already made are never rolled back.

use std::collections::{BTreeMap, HashMap};

use crate::collections::{CollectionResolver, ResolveError};
use crate::descriptor::{self, DescriptorError};
use crate::remote::{
    Collection, CollectionId, DataId, DataObject, DataQuery, RemoteError, RemoteJobClient,
    SampleId,
};

/// A sample filed into a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub sample: SampleId,
    pub data: DataId,
    pub collection: CollectionId,
    pub collection_name: String,
}

/// A sample that could not be filed, and why.
#[derive(Debug)]
pub struct ItemFailure {
    pub sample: SampleId,
    pub data: DataId,
    pub reason: ItemFailureReason,
}

#[derive(Debug, thiserror::Error)]
pub enum ItemFailureReason {
    /// The experiment label could not be read from the descriptor.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Collection(#[from] ResolveError),
    #[error("Adding the sample to its collection failed: {0}")]
    Membership(RemoteError),
}

impl ItemFailureReason {
    /// True when the item's own metadata is at fault rather than the service.
    pub fn is_descriptor_problem(&self) -> bool {
        matches!(self, Self::Descriptor(_))
    }
}

#[derive(Debug, Default)]
pub struct ClassificationReport {
    pub assignments: Vec<Assignment>,
    pub failures: Vec<ItemFailure>,
    /// Output objects with no attached sample.
    pub skipped: usize,
}

impl ClassificationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of samples assigned to each collection name in this run.
    pub fn counts_by_collection(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for assignment in &self.assignments {
            *counts.entry(assignment.collection_name.as_str()).or_default() += 1;
        }
        counts
    }
}

pub struct ResultClassifier<'a, C: ?Sized> {
    client: &'a C,
    resolver: CollectionResolver<'a, C>,
}

impl<'a, C: RemoteJobClient + ?Sized> ResultClassifier<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            resolver: CollectionResolver::new(client),
        }
    }

    /// Classify every sample-bearing child of `parent`.
    ///
    /// Only the initial enumeration can fail the whole call; everything after
    /// that is reported per item.
    pub fn classify(&self, parent: DataId) -> Result<ClassificationReport, RemoteError> {
        let children = self.client.data(&DataQuery::children_of(parent))?;
        tracing::info!("Classifying {} outputs of {}", children.len(), parent);

        let mut report = ClassificationReport::default();
        let mut resolved: HashMap<String, Collection> = HashMap::new();
        for object in &children {
            let Some(sample) = object.sample else {
                report.skipped += 1;
                continue;
            };
            match self.assign(object, sample, &mut resolved) {
                Ok(assignment) => {
                    tracing::info!(
                        "Sample {} added to collection {}",
                        sample,
                        assignment.collection_name
                    );
                    report.assignments.push(assignment);
                }
                Err(reason) => {
                    tracing::warn!("Sample {} was not assigned to any collection: {}", sample, reason);
                    report.failures.push(ItemFailure {
                        sample,
                        data: object.id,
                        reason,
                    });
                }
            }
        }
        Ok(report)
    }

    fn assign(
        &self,
        object: &DataObject,
        sample: SampleId,
        resolved: &mut HashMap<String, Collection>,
    ) -> Result<Assignment, ItemFailureReason> {
        let name = descriptor::lookup_str(&object.descriptor, descriptor::EXPERIMENT_NAME_PATH)?;
        let collection = match resolved.get(name) {
            Some(collection) => collection.clone(),
            None => {
                let collection = self.resolver.resolve(name)?;
                resolved.insert(name.to_string(), collection.clone());
                collection
            }
        };
        self.client
            .add_samples(collection.id, &[sample])
            .map_err(ItemFailureReason::Membership)?;
        Ok(Assignment {
            sample,
            data: object.id,
            collection: collection.id,
            collection_name: collection.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, NewData};
    use serde_json::{Value, json};

    const OUTPUT: &str = "data:reads:fastq:single:";

    fn labelled(name: &str) -> Value {
        json!({ "other": { "experiment_name": name } })
    }

    fn add_output(remote: &MemoryRemote, parent: DataId, descriptor: Value) -> SampleId {
        let sample = remote.insert_sample("s", json!({}));
        remote.insert_data(
            NewData::new(OUTPUT)
                .parent(parent)
                .sample(sample)
                .descriptor(descriptor),
        );
        sample
    }

    #[test]
    fn malformed_descriptor_fails_only_its_own_item() {
        let remote = MemoryRemote::new();
        let parent = remote.insert_data(NewData::new("data:demultiplex:icount:"));
        let first = add_output(&remote, parent, labelled("exp1"));
        let broken = add_output(&remote, parent, json!({ "other": {} }));
        let third = add_output(&remote, parent, labelled("exp2"));

        let report = ResultClassifier::new(&remote).classify(parent).unwrap();
        assert_eq!(report.assignments.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].sample, broken);
        assert!(report.failures[0].reason.is_descriptor_problem());

        let exp1 = remote.collections_named("exp1");
        let exp2 = remote.collections_named("exp2");
        assert_eq!(remote.members(exp1[0]), vec![first]);
        assert_eq!(remote.members(exp2[0]), vec![third]);
    }

    #[test]
    fn shared_label_creates_one_collection() {
        let remote = MemoryRemote::new();
        let parent = remote.insert_data(NewData::new("data:demultiplex:icount:"));
        add_output(&remote, parent, labelled("exp1"));
        add_output(&remote, parent, labelled("exp1"));

        let report = ResultClassifier::new(&remote).classify(parent).unwrap();
        assert!(report.is_clean());
        assert_eq!(remote.created_collections(), 1);
        assert_eq!(report.counts_by_collection().get("exp1"), Some(&2));
    }

    #[test]
    fn objects_without_sample_are_skipped() {
        let remote = MemoryRemote::new();
        let parent = remote.insert_data(NewData::new("data:demultiplex:icount:"));
        remote.insert_data(NewData::new("data:icount:stats:").parent(parent));
        add_output(&remote, parent, labelled("exp1"));

        let report = ResultClassifier::new(&remote).classify(parent).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.assignments.len(), 1);
    }

    #[test]
    fn already_member_sample_is_not_an_error() {
        let remote = MemoryRemote::new();
        let parent = remote.insert_data(NewData::new("data:demultiplex:icount:"));
        let sample = add_output(&remote, parent, labelled("exp1"));
        let existing = remote.insert_collection("exp1");
        remote.insert_member(existing, sample);

        let report = ResultClassifier::new(&remote).classify(parent).unwrap();
        assert!(report.is_clean());
        assert_eq!(remote.members(existing), vec![sample]);
    }

    #[test]
    fn infrastructure_failures_are_distinguished_and_isolated() {
        let remote = MemoryRemote::new();
        let parent = remote.insert_data(NewData::new("data:demultiplex:icount:"));
        remote.insert_collection("dup");
        remote.insert_collection("dup");
        let ambiguous = add_output(&remote, parent, labelled("dup"));
        let unlucky = add_output(&remote, parent, labelled("exp1"));
        let fine = add_output(&remote, parent, labelled("exp1"));
        remote.fail_membership_for(unlucky);

        let report = ResultClassifier::new(&remote).classify(parent).unwrap();
        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].sample, fine);
        assert_eq!(report.failures.len(), 2);

        let reason_for = |sample: SampleId| {
            &report
                .failures
                .iter()
                .find(|failure| failure.sample == sample)
                .unwrap()
                .reason
        };
        assert!(matches!(
            reason_for(ambiguous),
            ItemFailureReason::Collection(ResolveError::Ambiguous { .. })
        ));
        assert!(matches!(reason_for(unlucky), ItemFailureReason::Membership(_)));
        assert!(!reason_for(unlucky).is_descriptor_problem());
    }
}
