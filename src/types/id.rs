// ABOUTME: Store-assigned image identifier.
// ABOUTME: Opaque content ID used as the unit of reference counting and removal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier returned by the image store after a pull or inspect.
///
/// Two references (`app:latest`, `app@sha256:..`) may resolve to the same
/// `ImageId`; counts and removals are always keyed by the ID.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use = "IDs reference images and should not be ignored"]
pub struct ImageId(String);

impl ImageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImageId").field(&self.0).finish()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ImageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ImageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_plain_string() {
        let id = ImageId::new("sha256:aaa");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sha256:aaa\"");
    }

    #[test]
    fn equal_values_hash_to_same_key() {
        let mut counts = std::collections::HashMap::new();
        counts.insert(ImageId::new("sha256:aaa"), 1);
        assert_eq!(counts.get(&ImageId::from("sha256:aaa")), Some(&1));
    }
}
