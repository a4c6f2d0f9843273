use crate::collections::CollectionResolver;
use crate::config::Config;
use crate::group::GroupSubmissionValidator;
use crate::remote::{Job, RemoteJobClient, Sample, SampleId, SampleQuery};

use super::PipelineError;

/// A group analysis over a working collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRequest {
    /// Name of the working collection. It must already exist, exactly once.
    pub collection: String,
    pub name: String,
    /// Samples to group; `None` groups every sample in the collection.
    pub sample_ids: Option<Vec<SampleId>>,
}

/// Resolve the working collection and samples, then submit the group job.
///
/// The submitted job is returned without waiting for it.
pub fn run_group_analysis<C: RemoteJobClient + ?Sized>(
    client: &C,
    config: &Config,
    request: &GroupRequest,
) -> Result<Job, PipelineError> {
    let collection = CollectionResolver::new(client)
        .require(&request.collection)
        .map_err(|source| PipelineError::WorkingCollection {
            name: request.collection.clone(),
            source,
        })?;

    let samples = match &request.sample_ids {
        Some(ids) => explicit_samples(client, ids)?,
        None => client.samples(&SampleQuery::InCollection(collection.id))?,
    };
    tracing::info!(
        "Grouping {} samples from collection '{}' as '{}'",
        samples.len(),
        collection.name,
        request.name
    );

    let settings = config.group_settings();
    let job = GroupSubmissionValidator::new(client, &settings).submit_group(
        &collection,
        &samples,
        &request.name,
    )?;
    Ok(job)
}

fn explicit_samples<C: RemoteJobClient + ?Sized>(
    client: &C,
    ids: &[SampleId],
) -> Result<Vec<Sample>, PipelineError> {
    let mut samples = Vec::with_capacity(ids.len());
    for &id in ids {
        let sample = client
            .samples(&SampleQuery::ById(id))?
            .into_iter()
            .next()
            .ok_or(PipelineError::UnknownSample(id))?;
        samples.push(sample);
    }
    Ok(samples)
}
