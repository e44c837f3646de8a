//! Policy export file kinds, recognised by file name

use serde::Serialize;
use std::fmt;

/// Kind of payload carried by a policy export file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyFileKind {
    DataQualityPolicies,
    DataDriftPolicies,
    SchemaDriftPolicies,
    ReconciliationPolicies,
    ProfileAnomalyPolicies,
    DataCadencePolicies,
    BusinessRules,
    AssetUdfVariables,
    DataSources,
    NotificationSettings,
    PackageUdfDefinitions,
    ReferenceAsset,
    Other,
}

/// File name fragments, checked in order
const NAME_FRAGMENTS: &[(&str, PolicyFileKind)] = &[
    ("data_quality_policy_definitions", PolicyFileKind::DataQualityPolicies),
    ("data_drift_policy_definitions", PolicyFileKind::DataDriftPolicies),
    ("schema_drift_policy_definitions", PolicyFileKind::SchemaDriftPolicies),
    ("reconciliation_policy_definitions", PolicyFileKind::ReconciliationPolicies),
    ("profile_anomaly_policy_definition", PolicyFileKind::ProfileAnomalyPolicies),
    ("data_cadence_policy_definitions", PolicyFileKind::DataCadencePolicies),
    ("business_rules", PolicyFileKind::BusinessRules),
    ("asset_udf_variables", PolicyFileKind::AssetUdfVariables),
    ("data_sources", PolicyFileKind::DataSources),
    ("notification_settings", PolicyFileKind::NotificationSettings),
    ("package_udf_definitions", PolicyFileKind::PackageUdfDefinitions),
    ("reference_asset", PolicyFileKind::ReferenceAsset),
];

impl PolicyFileKind {
    /// Classify by the entry or file name (path components are ignored)
    pub fn from_file_name(name: &str) -> Self {
        let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name).to_lowercase();
        NAME_FRAGMENTS
            .iter()
            .find(|(fragment, _)| base.contains(fragment))
            .map(|(_, kind)| *kind)
            .unwrap_or(PolicyFileKind::Other)
    }

    /// Policy definition exports, the only files whose top-level objects are policies
    pub fn is_policy_definition(self) -> bool {
        matches!(
            self,
            PolicyFileKind::DataQualityPolicies
                | PolicyFileKind::DataDriftPolicies
                | PolicyFileKind::SchemaDriftPolicies
                | PolicyFileKind::ReconciliationPolicies
                | PolicyFileKind::ProfileAnomalyPolicies
                | PolicyFileKind::DataCadencePolicies
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            PolicyFileKind::DataQualityPolicies => "Data Quality Policy Definitions",
            PolicyFileKind::DataDriftPolicies => "Data Drift Policy Definitions",
            PolicyFileKind::SchemaDriftPolicies => "Schema Drift Policy Definitions",
            PolicyFileKind::ReconciliationPolicies => "Reconciliation Policy Definitions",
            PolicyFileKind::ProfileAnomalyPolicies => "Profile Anomaly Policy Definition",
            PolicyFileKind::DataCadencePolicies => "Data Cadence Policy Definitions",
            PolicyFileKind::BusinessRules => "Business Rules",
            PolicyFileKind::AssetUdfVariables => "Asset UDF Variables",
            PolicyFileKind::DataSources => "Data Sources",
            PolicyFileKind::NotificationSettings => "Notification Settings",
            PolicyFileKind::PackageUdfDefinitions => "Package UDF Definitions",
            PolicyFileKind::ReferenceAsset => "Reference Asset",
            PolicyFileKind::Other => "Other/Unknown",
        }
    }
}

impl fmt::Display for PolicyFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
