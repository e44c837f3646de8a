//! Asset discovery inside policy payloads
//!
//! Asset descriptors appear at varying depths, so matching is a predicate over
//! generic JSON objects driven by configurable field-name candidates rather
//! than a fixed deserialization type.
//!
//! **Descriptor:** an object with a usable uid-candidate key that also carries
//! a marker field (engine, segmentation, tags) or sits directly under an asset
//! container key (`backingAssets`, ...).
//!
//! **Context:** engine type and segmentation found on enclosing objects are
//! inherited by nested descriptors that do not carry their own. An object that
//! holds a container itself (a policy) only carries context; its own uid is a
//! bare asset and never lands in a segmented category.

use crate::models::{AssetCategory, AssetRecord, EngineType, JsonDocument, PolicyFileKind};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field-name candidates used by the descriptor predicate
///
/// Every list is tried in order; the first key present wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DescriptorFields {
    pub uid: Vec<String>,
    pub engine_type: Vec<String>,
    pub segmented: Vec<String>,
    pub tags: Vec<String>,
    /// Keys whose object (or list of objects) value holds asset descriptors
    pub containers: Vec<String>,
    /// Keys whose string value references another asset by uid
    pub referenced_uid: Vec<String>,
}

const UID_FIELDS: &[&str] = &["uid"];
const ENGINE_FIELDS: &[&str] = &["engineType", "engine_type"];
const SEGMENTED_FIELDS: &[&str] = &["isSegmented", "is_segmented"];
const TAG_FIELDS: &[&str] = &["tags"];
const CONTAINER_FIELDS: &[&str] = &["asset", "assets", "backingAsset", "backingAssets"];
const REFERENCED_UID_FIELDS: &[&str] = &["parentAssetUid", "backingAssetUid", "assetUid"];

/// Key read from tag objects (`{"name": "pii"}`)
const TAG_NAME_FIELD: &str = "name";

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl Default for DescriptorFields {
    fn default() -> Self {
        Self {
            uid: owned(UID_FIELDS),
            engine_type: owned(ENGINE_FIELDS),
            segmented: owned(SEGMENTED_FIELDS),
            tags: owned(TAG_FIELDS),
            containers: owned(CONTAINER_FIELDS),
            referenced_uid: owned(REFERENCED_UID_FIELDS),
        }
    }
}

/// Outcome of the descriptor predicate for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorMatch {
    /// Descriptor with a usable (trimmed, non-empty) uid
    Descriptor(String),
    /// Descriptor-shaped but without a usable uid
    MissingUid,
    /// Holds an asset container; passes context down, with its own uid if usable
    ContextCarrier(Option<String>),
    NotDescriptor,
}

impl DescriptorFields {
    /// Apply the descriptor predicate to one object
    ///
    /// Objects that hold an asset container themselves (a policy carrying
    /// `backingAssets`) are context carriers, never descriptors.
    pub fn matches(&self, object: &Map<String, Value>, under_container: bool) -> DescriptorMatch {
        if self.has_container(object) {
            return DescriptorMatch::ContextCarrier(self.uid_of(object));
        }
        if !self.has_marker(object) && !under_container {
            return DescriptorMatch::NotDescriptor;
        }

        match self.uid_of(object) {
            Some(uid) => DescriptorMatch::Descriptor(uid),
            None => DescriptorMatch::MissingUid,
        }
    }

    fn has_marker(&self, object: &Map<String, Value>) -> bool {
        [&self.engine_type, &self.segmented, &self.tags]
            .iter()
            .any(|names| names.iter().any(|n| object.contains_key(n)))
    }

    fn has_container(&self, object: &Map<String, Value>) -> bool {
        self.containers.iter().any(|n| object.contains_key(n))
    }

    fn is_container_key(&self, key: &str) -> bool {
        self.containers.iter().any(|n| n == key)
    }

    fn is_referenced_uid_key(&self, key: &str) -> bool {
        self.referenced_uid.iter().any(|n| n == key)
    }

    fn uid_of(&self, object: &Map<String, Value>) -> Option<String> {
        first_present(object, &self.uid)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(str::to_string)
    }

    /// `None` when no engine key is present
    fn engine_of(&self, object: &Map<String, Value>) -> Option<EngineType> {
        first_present(object, &self.engine_type).map(|v| EngineType::normalize(v.as_str()))
    }

    /// `None` when no segmentation key is present or its value is not boolean-like
    fn segmented_of(&self, object: &Map<String, Value>) -> Option<bool> {
        match first_present(object, &self.segmented)? {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn tags_of(&self, object: &Map<String, Value>) -> IndexSet<String> {
        let Some(Value::Array(items)) = first_present(object, &self.tags) else {
            return IndexSet::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag.as_str()),
                Value::Object(tag) => tag.get(TAG_NAME_FIELD).and_then(Value::as_str),
                _ => None,
            })
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn first_present<'a>(object: &'a Map<String, Value>, names: &[String]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(name))
}

/// Per-document policy counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PolicyCounts {
    pub total: usize,
    pub segmented_spark: usize,
    pub segmented_jdbc: usize,
    pub non_segmented: usize,
}

impl PolicyCounts {
    pub fn absorb(&mut self, other: &PolicyCounts) {
        self.total += other.total;
        self.segmented_spark += other.segmented_spark;
        self.segmented_jdbc += other.segmented_jdbc;
        self.non_segmented += other.non_segmented;
    }

    fn count(&mut self, engine: EngineType, segmented: bool) {
        self.total += 1;
        match (segmented, engine) {
            (true, EngineType::Spark) => self.segmented_spark += 1,
            (true, EngineType::JdbcSql) => self.segmented_jdbc += 1,
            (true, _) => {}
            (false, _) => self.non_segmented += 1,
        }
    }
}

/// Result of classifying one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Discovery (depth-first pre-order) order, may repeat a uid
    pub records: Vec<AssetRecord>,
    pub descriptors_without_uid: usize,
    pub policies: PolicyCounts,
}

#[derive(Debug, Clone, Copy, Default)]
struct Inherited {
    engine: EngineType,
    segmented: Option<bool>,
}

/// Walks documents and extracts asset records
pub struct AssetClassifier {
    fields: DescriptorFields,
}

impl AssetClassifier {
    pub fn new(fields: DescriptorFields) -> Self {
        Self { fields }
    }

    pub fn classify(&self, document: &JsonDocument) -> Classification {
        let kind = PolicyFileKind::from_file_name(&document.file_name);
        let mut classification = Classification {
            policies: if kind.is_policy_definition() {
                self.count_policies(&document.value)
            } else {
                PolicyCounts::default()
            },
            ..Default::default()
        };
        self.walk(&document.value, Inherited::default(), false, &mut classification);

        tracing::debug!(
            file = %document.file_name,
            records = classification.records.len(),
            without_uid = classification.descriptors_without_uid,
            policies = classification.policies.total,
            "Document classified"
        );
        classification
    }

    /// Top-level policies: the document itself, or each object of a top-level array
    fn count_policies(&self, value: &Value) -> PolicyCounts {
        let mut counts = PolicyCounts::default();
        let mut count_one = |policy: &Map<String, Value>| {
            let engine = self.fields.engine_of(policy).unwrap_or_default();
            let segmented = self.fields.segmented_of(policy).unwrap_or(false);
            counts.count(engine, segmented);
        };
        match value {
            Value::Object(policy) => count_one(policy),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .for_each(count_one),
            _ => {}
        }
        counts
    }

    fn walk(&self, value: &Value, inherited: Inherited, under_container: bool, out: &mut Classification) {
        match value {
            Value::Object(object) => self.visit_object(object, inherited, under_container, out),
            Value::Array(items) => {
                for item in items {
                    self.walk(item, inherited, under_container, out);
                }
            }
            _ => {}
        }
    }

    fn visit_object(
        &self,
        object: &Map<String, Value>,
        inherited: Inherited,
        under_container: bool,
        out: &mut Classification,
    ) {
        let own_engine = self.fields.engine_of(object).filter(|e| e.is_known());
        let context = Inherited {
            engine: own_engine.unwrap_or(inherited.engine),
            segmented: self.fields.segmented_of(object).or(inherited.segmented),
        };

        match self.fields.matches(object, under_container) {
            DescriptorMatch::Descriptor(uid) => {
                if let Some(mut record) = AssetRecord::new(&uid) {
                    record.engine_type = context.engine;
                    record.is_segmented = context.segmented.unwrap_or(false);
                    record.tags = self.fields.tags_of(object);
                    out.records.push(record);
                }
            }
            DescriptorMatch::ContextCarrier(uid) => {
                if let Some(record) = uid.and_then(AssetRecord::new) {
                    out.records.push(record);
                }
            }
            DescriptorMatch::MissingUid => {
                tracing::debug!("Descriptor without uid skipped");
                out.descriptors_without_uid += 1;
            }
            DescriptorMatch::NotDescriptor => {}
        }

        for (key, child) in object {
            if self.fields.is_referenced_uid_key(key) {
                if let Some(record) = child.as_str().and_then(AssetRecord::new) {
                    out.records.push(record);
                }
                continue;
            }
            let child_under_container = self.fields.is_container_key(key);
            self.walk(child, context, child_under_container, out);
        }
    }
}

/// Run-wide reducer of asset records
///
/// Records are keyed by uid in first-seen order; repeats are merged with
/// [`AssetRecord::merge`].
#[derive(Debug, Clone, Default)]
pub struct AssetAggregate {
    records: IndexMap<String, AssetRecord>,
}

impl AssetAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, records: impl IntoIterator<Item = AssetRecord>) {
        for record in records {
            match self.records.get_mut(&record.uid) {
                Some(existing) => existing.merge(&record),
                None => {
                    self.records.insert(record.uid.clone(), record);
                }
            }
        }
    }

    pub fn get(&self, uid: &str) -> Option<&AssetRecord> {
        self.records.get(uid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Members of `category`, sorted by uid (byte-wise)
    pub fn records(&self, category: AssetCategory) -> Vec<&AssetRecord> {
        let mut members: Vec<&AssetRecord> = self
            .records
            .values()
            .filter(|record| record.belongs_to(category))
            .collect();
        members.sort_by(|a, b| a.uid.as_bytes().cmp(b.uid.as_bytes()));
        members
    }

    pub fn count(&self, category: AssetCategory) -> usize {
        self.records.values().filter(|r| r.belongs_to(category)).count()
    }
}
