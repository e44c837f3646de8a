//! Assets discovered inside policy payloads

use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;

/// Compute engine backing an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineType {
    Spark,
    JdbcSql,
    /// Named engine that is neither SPARK nor JDBC_SQL
    Other,
    /// Missing, empty, or not a string
    #[default]
    Unknown,
}

impl EngineType {
    /// Normalise a raw `engineType` value
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return EngineType::Unknown;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            EngineType::Unknown
        } else if raw.eq_ignore_ascii_case("SPARK") {
            EngineType::Spark
        } else if raw.eq_ignore_ascii_case("JDBC_SQL") {
            EngineType::JdbcSql
        } else {
            EngineType::Other
        }
    }

    pub fn is_known(self) -> bool {
        self != EngineType::Unknown
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineType::Spark => "SPARK",
            EngineType::JdbcSql => "JDBC_SQL",
            EngineType::Other => "OTHER",
            EngineType::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Output category an asset can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    AllAssets,
    SegmentedSpark,
    SegmentedJdbc,
    TagBearing,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::AllAssets,
        AssetCategory::SegmentedSpark,
        AssetCategory::SegmentedJdbc,
        AssetCategory::TagBearing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::AllAssets => "all-assets",
            AssetCategory::SegmentedSpark => "segmented-spark",
            AssetCategory::SegmentedJdbc => "segmented-jdbc",
            AssetCategory::TagBearing => "tag-bearing",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Asset extracted from a JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    /// Never empty
    pub uid: String,
    pub engine_type: EngineType,
    pub is_segmented: bool,
    /// Insertion-ordered, no duplicates
    pub tags: IndexSet<String>,
}

impl AssetRecord {
    /// Bare record carrying only a uid; `None` for a blank uid
    pub fn new(uid: impl AsRef<str>) -> Option<Self> {
        let uid = uid.as_ref().trim();
        if uid.is_empty() {
            return None;
        }
        Some(Self {
            uid: uid.to_string(),
            engine_type: EngineType::Unknown,
            is_segmented: false,
            tags: IndexSet::new(),
        })
    }

    /// Merge a later sighting of the same uid into this record
    ///
    /// First non-UNKNOWN engine wins, segmentation is OR-ed and tags are unioned.
    pub fn merge(&mut self, other: &AssetRecord) {
        debug_assert_eq!(self.uid, other.uid);

        if !self.engine_type.is_known() && other.engine_type.is_known() {
            self.engine_type = other.engine_type;
        }
        self.is_segmented |= other.is_segmented;
        for tag in &other.tags {
            self.tags.insert(tag.clone());
        }
    }

    pub fn belongs_to(&self, category: AssetCategory) -> bool {
        match category {
            AssetCategory::AllAssets => true,
            AssetCategory::SegmentedSpark => {
                self.is_segmented && self.engine_type == EngineType::Spark
            }
            AssetCategory::SegmentedJdbc => {
                self.is_segmented && self.engine_type == EngineType::JdbcSql
            }
            AssetCategory::TagBearing => !self.tags.is_empty(),
        }
    }
}
