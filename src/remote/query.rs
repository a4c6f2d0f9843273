use super::types::{CollectionId, DataId, DataObject, SampleId};

/// Filter for data object lookups. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuery {
    pub id: Option<DataId>,
    pub parent: Option<DataId>,
    /// Type tags are hierarchical, so this matches by prefix.
    pub type_prefix: Option<String>,
    pub sample: Option<SampleId>,
    pub slug: Option<String>,
}

impl DataQuery {
    pub fn children_of(parent: DataId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn for_sample(sample: SampleId) -> Self {
        Self {
            sample: Some(sample),
            ..Self::default()
        }
    }

    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, type_prefix: impl Into<String>) -> Self {
        self.type_prefix = Some(type_prefix.into());
        self
    }

    /// Evaluate the filter locally against an already fetched object.
    pub fn matches(&self, object: &DataObject) -> bool {
        self.id.is_none_or(|id| object.id == id)
            && self.parent.is_none_or(|parent| object.parents.contains(&parent))
            && self
                .type_prefix
                .as_deref()
                .is_none_or(|prefix| object.type_tag.starts_with(prefix))
            && self.sample.is_none_or(|sample| object.sample == Some(sample))
            && self.slug.as_deref().is_none_or(|slug| object.slug == slug)
    }
}

/// Sample lookups supported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleQuery {
    ById(SampleId),
    InCollection(CollectionId),
    /// The sample a data object is attached to.
    ForData(DataId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::JobStatus;

    fn object(type_tag: &str, parents: &[u64], sample: Option<u64>) -> DataObject {
        DataObject {
            id: DataId(10),
            slug: "reads-10".into(),
            type_tag: type_tag.into(),
            status: JobStatus::Ok,
            parents: parents.iter().copied().map(DataId).collect(),
            sample: sample.map(SampleId),
            descriptor: serde_json::Value::Null,
        }
    }

    #[test]
    fn type_filter_matches_by_prefix() {
        let obj = object("data:demultiplex:icount:", &[1], None);
        assert!(DataQuery::children_of(DataId(1)).with_type("data:demultiplex:").matches(&obj));
        assert!(!DataQuery::children_of(DataId(1)).with_type("data:bed:").matches(&obj));
        assert!(!DataQuery::children_of(DataId(2)).matches(&obj));
    }

    #[test]
    fn empty_query_matches_anything() {
        assert!(DataQuery::default().matches(&object("data:x:", &[], None)));
    }

    #[test]
    fn sample_and_slug_filters_are_exact() {
        let obj = object("data:bed:icount:", &[], Some(4));
        assert!(DataQuery::for_sample(SampleId(4)).matches(&obj));
        assert!(!DataQuery::for_sample(SampleId(5)).matches(&obj));
        assert!(DataQuery::by_slug("reads-10").matches(&obj));
        assert!(!DataQuery::by_slug("reads").matches(&obj));
    }
}
