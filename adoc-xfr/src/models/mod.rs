//! Data model for the transfer pipeline

pub mod asset_record;
pub mod policy_kind;
pub mod source_file;
pub mod transform_spec;

pub use asset_record::{AssetCategory, AssetRecord, EngineType};
pub use policy_kind::PolicyFileKind;
pub use source_file::{
    ArchiveEntry, JsonDocument, RawEntry, SourceFile, SourceKind, IMPORT_READY_MARKER,
};
pub use transform_spec::{TransformPair, TransformSpec};
