//! Contract types for the backend JSON bodies.
//!
//! Fields this controller does not interpret are captured via
//! `#[serde(flatten)]` maps so a fetched release group can be pushed back
//! unchanged apart from the parts we deliberately rewrite.

use serde::{Deserialize, Serialize};

/// One `{key, value}` metadata entry on a constraint or instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

/// A weighted routing constraint inside a rule set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingConstraint {
    pub cluster_key: String,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
    pub weight: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The active routing rule set. Only the `light` list carries live traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    #[serde(default)]
    pub light: Vec<RoutingConstraint>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `result` body of a release group, as fetched and as pushed back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseGroup {
    pub default: RuleSet,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Top-level envelope for `GET shared_rules/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseGroupEnvelope {
    pub result: ReleaseGroup,
}

/// One running workload replica.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceRecord {
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Cluster membership as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Top-level envelope for `GET cluster/{key}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterEnvelope {
    pub result: ClusterSnapshot,
}

/// Scan metadata entries in order; the last entry with a matching key wins.
///
/// The backend does not promise uniqueness, so duplicates resolve to the
/// final occurrence.
fn metadata_last<'a>(entries: &'a [MetadataEntry], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .rev()
        .find(|e| e.key == key)
        .map(|e| e.value.as_str())
}

impl RoutingConstraint {
    /// Value of the last metadata entry with the given key, if any.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        metadata_last(&self.metadata, key)
    }
}

impl InstanceRecord {
    /// Value of the last metadata entry with the given key, if any.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        metadata_last(&self.metadata, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_release_group() {
        let body = serde_json::json!({
            "result": {
                "rule_key": "rk-1",
                "default": {
                    "light": [{
                        "constraint_key": "ck-1",
                        "cluster_key": "all-in-one-server",
                        "metadata": [
                            {"key": "stage", "value": "prod"},
                            {"key": "version", "value": "v1"}
                        ],
                        "weight": 10000
                    }]
                }
            }
        });
        let envelope: ReleaseGroupEnvelope = serde_json::from_value(body).unwrap();
        let first = &envelope.result.default.light[0];
        assert_eq!(first.cluster_key, "all-in-one-server");
        assert_eq!(first.weight, 10000);
        assert_eq!(first.metadata_value("version"), Some("v1"));
        assert_eq!(first.metadata_value("stage"), Some("prod"));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let body = serde_json::json!({
            "result": {
                "rule_key": "rk-1",
                "zone_key": "zk-9",
                "default": {
                    "light": [{
                        "constraint_key": "ck-1",
                        "cluster_key": "c",
                        "metadata": [],
                        "weight": 10000
                    }],
                    "dark": [],
                    "tap": []
                }
            }
        });
        let envelope: ReleaseGroupEnvelope = serde_json::from_value(body.clone()).unwrap();
        let back = serde_json::to_value(&envelope).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn duplicate_metadata_keys_resolve_to_the_last() {
        let constraint = RoutingConstraint {
            cluster_key: "c".into(),
            metadata: vec![
                MetadataEntry { key: "version".into(), value: "v1".into() },
                MetadataEntry { key: "version".into(), value: "v2".into() },
            ],
            weight: 10000,
            extra: Default::default(),
        };
        assert_eq!(constraint.metadata_value("version"), Some("v2"));
    }

    #[test]
    fn instance_without_version_reads_as_none() {
        let body = serde_json::json!({
            "result": {
                "instances": [
                    {"host": "10.0.0.1", "port": 8080, "metadata": [{"key": "stage", "value": "prod"}]},
                    {"host": "10.0.0.2", "port": 8080}
                ]
            }
        });
        let envelope: ClusterEnvelope = serde_json::from_value(body).unwrap();
        let instances = &envelope.result.instances;
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].metadata_value("stage"), Some("prod"));
        assert_eq!(instances[0].metadata_value("version"), None);
        assert_eq!(instances[1].metadata_value("stage"), None);
    }
}
