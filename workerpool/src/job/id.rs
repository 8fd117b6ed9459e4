//! Job identity tokens.

use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Opaque, globally unique identifier of a submitted job.
///
/// Generated as a random (v4) UUID in its 36-character hyphenated form.
/// [`Job::id`](crate::Job::id) materializes it lazily on first access.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_uuid_v4() {
        let id = JobId::generate();
        assert_eq!(id.as_str().len(), 36);
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn test_display_and_debug() {
        let id = JobId::from("reindex-42");
        assert_eq!(id.to_string(), "reindex-42");
        assert_eq!(format!("{:?}", id), "JobId(reindex-42)");
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(JobId::from("a"), 1);
        assert_eq!(map.get("a"), Some(&1));
    }
}
