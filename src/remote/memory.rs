//! Scripted in-process backend.
//!
//! `MemoryRemote` keeps every entity in memory and lets callers script the
//! status sequence each job reports on successive refreshes. It records the
//! calls it receives so tests can assert on side effects (collections created,
//! submissions made, refreshes performed).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::query::{DataQuery, SampleQuery};
use super::types::{
    Collection, CollectionId, DataId, DataObject, Job, JobStatus, JobSubmission, Sample,
    SampleId, UploadedFile,
};
use super::{RemoteError, RemoteJobClient};

/// Builder for a data object inserted into a [`MemoryRemote`].
#[derive(Debug, Clone)]
pub struct NewData {
    type_tag: String,
    slug: String,
    parents: Vec<DataId>,
    sample: Option<SampleId>,
    descriptor: Value,
    statuses: Vec<JobStatus>,
}

impl NewData {
    /// A finished (`OK`) object with the given type tag and no relations.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            slug: String::new(),
            parents: Vec::new(),
            sample: None,
            descriptor: Value::Object(Map::new()),
            statuses: vec![JobStatus::Ok],
        }
    }

    pub fn parent(mut self, parent: DataId) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn sample(mut self, sample: SampleId) -> Self {
        self.sample = Some(sample);
        self
    }

    pub fn descriptor(mut self, descriptor: Value) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    /// Statuses reported on successive refreshes. The first one is also the
    /// status seen by queries before any refresh; the last one sticks.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        if self.statuses.is_empty() {
            self.statuses.push(JobStatus::Pending);
        }
        self
    }
}

#[derive(Debug)]
struct DataRecord {
    object: DataObject,
    input: Map<String, Value>,
    script: VecDeque<JobStatus>,
    refreshes: usize,
}

impl DataRecord {
    fn advance(&mut self) -> JobStatus {
        if let Some(next) = self.script.pop_front() {
            self.object.status = next;
        }
        self.refreshes += 1;
        self.object.status
    }

    fn job(&self) -> Job {
        let mut job = Job::from(self.object.clone());
        job.input = self.input.clone();
        job
    }
}

#[derive(Debug)]
struct Reservation {
    id: DataId,
    statuses: Vec<JobStatus>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    data: BTreeMap<DataId, DataRecord>,
    samples: BTreeMap<SampleId, Sample>,
    collections: BTreeMap<CollectionId, (Collection, BTreeSet<SampleId>)>,
    reservations: HashMap<String, VecDeque<Reservation>>,
    submissions: Vec<(DataId, JobSubmission)>,
    uploads: Vec<PathBuf>,
    created_collections: usize,
    race_next_create: bool,
    reject_next_create: bool,
    failing_members: HashSet<SampleId>,
    calls: usize,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`RemoteJobClient`] with scriptable job status sequences.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: RefCell<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the id the next submission of `process` will receive.
    ///
    /// The submitted job starts `PENDING` and reports `statuses` on successive
    /// refreshes. Reserving lets tests attach children to a job before it exists.
    pub fn expect_submission(
        &self,
        process: &str,
        statuses: impl IntoIterator<Item = JobStatus>,
    ) -> DataId {
        let mut state = self.state.borrow_mut();
        let id = DataId(state.allocate());
        state
            .reservations
            .entry(process.to_string())
            .or_default()
            .push_back(Reservation {
                id,
                statuses: statuses.into_iter().collect(),
            });
        id
    }

    pub fn insert_data(&self, data: NewData) -> DataId {
        let mut state = self.state.borrow_mut();
        let id = DataId(state.allocate());
        let mut script: VecDeque<JobStatus> = data.statuses.into();
        let initial = script.front().copied().unwrap_or(JobStatus::Pending);
        if script.len() == 1 {
            script.clear();
        }
        let slug = if data.slug.is_empty() {
            format!("data-{id}")
        } else {
            data.slug
        };
        state.data.insert(
            id,
            DataRecord {
                object: DataObject {
                    id,
                    slug,
                    type_tag: data.type_tag,
                    status: initial,
                    parents: data.parents,
                    sample: data.sample,
                    descriptor: data.descriptor,
                },
                input: Map::new(),
                script,
                refreshes: 0,
            },
        );
        id
    }

    pub fn insert_sample(&self, name: &str, descriptor: Value) -> SampleId {
        let mut state = self.state.borrow_mut();
        let id = SampleId(state.allocate());
        state.samples.insert(
            id,
            Sample {
                id,
                name: name.to_string(),
                descriptor,
            },
        );
        id
    }

    /// Insert a collection without checking for an existing one of the same name.
    pub fn insert_collection(&self, name: &str) -> CollectionId {
        let mut state = self.state.borrow_mut();
        let id = CollectionId(state.allocate());
        state.collections.insert(
            id,
            (
                Collection {
                    id,
                    name: name.to_string(),
                },
                BTreeSet::new(),
            ),
        );
        id
    }

    pub fn insert_member(&self, collection: CollectionId, sample: SampleId) {
        if let Some((_, members)) = self.state.borrow_mut().collections.get_mut(&collection) {
            members.insert(sample);
        }
    }

    /// Make the next `create_collection` lose a race: another writer creates the
    /// collection first and the call fails with [`RemoteError::Conflict`].
    pub fn race_next_create(&self) {
        self.state.borrow_mut().race_next_create = true;
    }

    /// Make the next `create_collection` fail with [`RemoteError::Conflict`]
    /// while leaving no collection behind.
    pub fn reject_next_create(&self) {
        self.state.borrow_mut().reject_next_create = true;
    }

    /// Make membership updates that include `sample` fail with a transport error.
    pub fn fail_membership_for(&self, sample: SampleId) {
        self.state.borrow_mut().failing_members.insert(sample);
    }

    /// Submissions in the order they were made, with the ids they received.
    pub fn submissions(&self) -> Vec<(DataId, JobSubmission)> {
        self.state.borrow().submissions.clone()
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.state.borrow().uploads.clone()
    }

    /// Ids of every collection with exactly this name.
    pub fn collections_named(&self, name: &str) -> Vec<CollectionId> {
        self.state
            .borrow()
            .collections
            .values()
            .filter(|(collection, _)| collection.name == name)
            .map(|(collection, _)| collection.id)
            .collect()
    }

    pub fn collection_count(&self) -> usize {
        self.state.borrow().collections.len()
    }

    /// Collections created through [`RemoteJobClient::create_collection`].
    pub fn created_collections(&self) -> usize {
        self.state.borrow().created_collections
    }

    pub fn members(&self, collection: CollectionId) -> Vec<SampleId> {
        self.state
            .borrow()
            .collections
            .get(&collection)
            .map(|(_, members)| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn refresh_count(&self, id: DataId) -> usize {
        self.state
            .borrow()
            .data
            .get(&id)
            .map(|record| record.refreshes)
            .unwrap_or(0)
    }

    /// Total number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.state.borrow().calls
    }
}

impl RemoteJobClient for MemoryRemote {
    fn submit(&self, submission: &JobSubmission) -> Result<Job, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        let reservation = state
            .reservations
            .get_mut(&submission.process)
            .and_then(VecDeque::pop_front);
        let (id, script) = match reservation {
            Some(reservation) => (reservation.id, reservation.statuses.into()),
            None => (DataId(state.allocate()), VecDeque::new()),
        };
        let parents = submission
            .input
            .values()
            .filter_map(Value::as_u64)
            .map(DataId)
            .filter(|parent| state.data.contains_key(parent))
            .collect();
        let record = DataRecord {
            object: DataObject {
                id,
                slug: format!("{}-{id}", submission.process),
                type_tag: format!("data:{}:", submission.process),
                status: JobStatus::Pending,
                parents,
                sample: None,
                descriptor: Value::Object(Map::new()),
            },
            input: submission.input.clone(),
            script,
            refreshes: 0,
        };
        let job = record.job();
        state.data.insert(id, record);
        state.submissions.push((id, submission.clone()));
        Ok(job)
    }

    fn refresh(&self, job: &mut Job) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        let record = state
            .data
            .get_mut(&job.id)
            .ok_or_else(|| RemoteError::NotFound(format!("data {}", job.id)))?;
        job.status = record.advance();
        Ok(())
    }

    fn data(&self, query: &DataQuery) -> Result<Vec<DataObject>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        Ok(state
            .data
            .values()
            .map(|record| &record.object)
            .filter(|object| query.matches(object))
            .cloned()
            .collect())
    }

    fn samples(&self, query: &SampleQuery) -> Result<Vec<Sample>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        let samples: Vec<Sample> = match *query {
            SampleQuery::ById(id) => state.samples.get(&id).cloned().into_iter().collect(),
            SampleQuery::InCollection(collection) => state
                .collections
                .get(&collection)
                .map(|(_, members)| {
                    members
                        .iter()
                        .filter_map(|id| state.samples.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default(),
            SampleQuery::ForData(data) => state
                .data
                .get(&data)
                .and_then(|record| record.object.sample)
                .and_then(|id| state.samples.get(&id).cloned())
                .into_iter()
                .collect(),
        };
        Ok(samples)
    }

    fn collections(&self, name: &str) -> Result<Vec<Collection>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        Ok(state
            .collections
            .values()
            .filter(|(collection, _)| collection.name == name)
            .map(|(collection, _)| collection.clone())
            .collect())
    }

    fn create_collection(&self, name: &str) -> Result<Collection, RemoteError> {
        let (raced, rejected) = {
            let mut state = self.state.borrow_mut();
            state.calls += 1;
            (
                std::mem::take(&mut state.race_next_create),
                std::mem::take(&mut state.reject_next_create),
            )
        };
        if rejected {
            return Err(RemoteError::Conflict(format!("collection '{name}' rejected")));
        }
        if raced {
            self.insert_collection(name);
            return Err(RemoteError::Conflict(format!("collection '{name}' exists")));
        }
        let id = self.insert_collection(name);
        self.state.borrow_mut().created_collections += 1;
        Ok(Collection {
            id,
            name: name.to_string(),
        })
    }

    fn add_samples(
        &self,
        collection: CollectionId,
        samples: &[SampleId],
    ) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        if let Some(sample) = samples
            .iter()
            .find(|sample| state.failing_members.contains(*sample))
        {
            return Err(RemoteError::Transport(format!(
                "connection reset while adding sample {sample}"
            )));
        }
        let (_, members) = state
            .collections
            .get_mut(&collection)
            .ok_or_else(|| RemoteError::NotFound(format!("collection {collection}")))?;
        members.extend(samples.iter().copied());
        Ok(())
    }

    fn upload_file(&self, path: &Path) -> Result<UploadedFile, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        state.uploads.push(path.to_path_buf());
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(UploadedFile {
            file,
            file_temp: format!("upload-{}", state.uploads.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refresh_walks_script_and_sticks_on_last_status() {
        let remote = MemoryRemote::new();
        let id = remote.insert_data(NewData::new("data:x:").statuses([
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Ok,
        ]));
        let mut job = Job::from(remote.data(&DataQuery::default()).unwrap().remove(0));
        assert_eq!(job.status, JobStatus::Pending);

        let mut seen = Vec::new();
        for _ in 0..4 {
            remote.refresh(&mut job).unwrap();
            seen.push(job.status);
        }
        assert_eq!(
            seen,
            vec![JobStatus::Pending, JobStatus::Running, JobStatus::Ok, JobStatus::Ok]
        );
        assert_eq!(remote.refresh_count(id), 4);
    }

    #[test]
    fn reserved_submission_uses_reserved_id_and_script() {
        let remote = MemoryRemote::new();
        let reserved = remote.expect_submission("workflow-x", [JobStatus::Error]);
        let mut job = remote.submit(&JobSubmission::new("workflow-x")).unwrap();
        assert_eq!(job.id, reserved);
        assert_eq!(job.status, JobStatus::Pending);
        remote.refresh(&mut job).unwrap();
        assert_eq!(job.status, JobStatus::Error);
    }

    #[test]
    fn membership_is_a_set() {
        let remote = MemoryRemote::new();
        let sample = remote.insert_sample("s1", json!({}));
        let collection = remote.create_collection("exp1").unwrap();
        remote.add_samples(collection.id, &[sample]).unwrap();
        remote.add_samples(collection.id, &[sample]).unwrap();
        assert_eq!(remote.members(collection.id), vec![sample]);
    }

    #[test]
    fn raced_create_leaves_the_winner_behind() {
        let remote = MemoryRemote::new();
        remote.race_next_create();
        let err = remote.create_collection("exp1").unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(_)));
        assert_eq!(remote.collections_named("exp1").len(), 1);
        assert_eq!(remote.created_collections(), 0);
    }

    #[test]
    fn attached_sample_is_found_through_data() {
        let remote = MemoryRemote::new();
        let sample = remote.insert_sample("s1", json!({}));
        let data = remote.insert_data(NewData::new("data:bed:icount:").sample(sample));
        let found = remote.samples(&SampleQuery::ForData(data)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, sample);
    }
}
