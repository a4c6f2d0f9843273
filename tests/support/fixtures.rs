use iclip_flow::config::Config;
use iclip_flow::pipeline::DemultiplexRequest;
use iclip_flow::remote::{CollectionId, DataId, MemoryRemote, NewData, SampleId};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const DEMULTIPLEX_PROCESS: &str = "workflow-icount-demultiplex";
pub const DEMULTIPLEX_OUTPUT: &str = "data:demultiplex:icount:";
pub const ANNOTATION: &str = "data:icount:annotsample:";
pub const READS: &str = "data:reads:fastq:single:";
pub const SITES: &str = "data:bed:icount:";
pub const SEGMENTATION: &str = "data:icount:segmentation:";

/// Default config with polling that never sleeps.
pub fn instant_config() -> Config {
    let mut config = Config::default();
    config.polling.interval_secs = 0;
    config
}

/// Two small input files that exist on disk for the lifetime of the `TempDir`.
pub fn demultiplex_inputs() -> (TempDir, DemultiplexRequest) {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("multiplexed.fq.gz");
    let annotation = dir.path().join("annotation.xlsx");
    std::fs::write(&reads, b"@r1\nACGTACGT\n+\nIIIIIIII\n").unwrap();
    std::fs::write(&annotation, b"annotation").unwrap();
    (dir, DemultiplexRequest { reads, annotation })
}

/// Ids of the objects a demultiplexing job will have produced.
pub struct DemultiplexRun {
    pub job: DataId,
    pub output: DataId,
    pub annotation: DataId,
}

/// Script a demultiplexing job and its two outputs with the given status sequences.
pub fn script_demultiplex(
    remote: &MemoryRemote,
    job_statuses: &[iclip_flow::remote::JobStatus],
    annotation_statuses: &[iclip_flow::remote::JobStatus],
) -> DemultiplexRun {
    let job = remote.expect_submission(DEMULTIPLEX_PROCESS, job_statuses.iter().copied());
    let output = remote.insert_data(NewData::new(DEMULTIPLEX_OUTPUT).parent(job));
    let annotation = remote.insert_data(
        NewData::new(ANNOTATION)
            .parent(job)
            .statuses(annotation_statuses.iter().copied()),
    );
    DemultiplexRun {
        job,
        output,
        annotation,
    }
}

/// Add a demultiplexed reads object under `output`, attached to a fresh sample.
pub fn add_demultiplexed(remote: &MemoryRemote, output: DataId, descriptor: Value) -> SampleId {
    let sample = remote.insert_sample("demultiplexed", json!({}));
    remote.insert_data(
        NewData::new(READS)
            .parent(output)
            .sample(sample)
            .descriptor(descriptor),
    );
    sample
}

pub fn experiment(name: &str) -> Value {
    json!({ "other": { "experiment_name": name } })
}

/// Insert a sample of `organism` into `collection`, with one cross-link sites object.
pub fn add_grouped_sample(
    remote: &MemoryRemote,
    collection: CollectionId,
    organism: &str,
) -> (SampleId, DataId) {
    let sample = remote.insert_sample(
        &format!("{organism} sample"),
        json!({ "sample": { "organism": organism } }),
    );
    let sites = remote.insert_data(NewData::new(SITES).sample(sample));
    remote.insert_member(collection, sample);
    (sample, sites)
}

pub fn add_reference(remote: &MemoryRemote, slug: &str) -> DataId {
    remote.insert_data(NewData::new(SEGMENTATION).slug(slug))
}
