use serde::{Deserialize, Serialize};

/// Namespace used when a topic is named without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Resolved, read-only view of a registered topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescriptor {
    pub name: String,
    pub namespace: String,
    /// Stable identifier written into every frame header.
    pub identifier: u32,
    /// Largest payload a single publish may carry.
    pub max_payload_size: usize,
}

impl TopicDescriptor {
    pub(crate) fn new(name: &str, namespace: &str, max_payload_size: usize) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            identifier: topic_identifier(name, namespace),
            max_payload_size,
        }
    }

    /// `namespace/name`, as used in logs and errors.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Compute the identifier for `name` inside `namespace`.
///
/// CRC-32 (IEEE) over `namespace`, a `/` separator, then `name`.
pub fn topic_identifier(name: &str, namespace: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_crc32_of_qualified_name() {
        assert_eq!(
            topic_identifier("imu", "default"),
            crc32fast::hash(b"default/imu")
        );
    }

    #[test]
    fn namespace_changes_identifier() {
        assert_ne!(
            topic_identifier("imu", "default"),
            topic_identifier("imu", "chassis")
        );
    }

    #[test]
    fn separator_prevents_ambiguous_joins() {
        assert_ne!(topic_identifier("b/c", "a"), topic_identifier("c", "ab"));
    }

    #[test]
    fn descriptor_serializes_to_json() {
        let descriptor = TopicDescriptor::new("topic1", DEFAULT_NAMESPACE, 4);
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["name"], "topic1");
        assert_eq!(json["namespace"], "default");
        assert_eq!(json["max_payload_size"], 4);
    }
}
