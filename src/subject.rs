//! Credential records and their identities

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// The identity of a subject: a `(user, url)` pair.
///
/// This doubles as the redacted summary returned by [`crate::Store::list`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl SubjectId {
    pub fn new(user: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            url: url.into(),
        }
    }
}

/// One credential entry: an identity plus its named secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(flatten)]
    pub id: SubjectId,
    /// Secret name to secret value, e.g. `"passphrase" -> "s3cr3t"`.
    #[serde(rename = "Secrets", default, deserialize_with = "nullable_map")]
    pub secrets: BTreeMap<String, String>,
}

impl Subject {
    pub fn new(id: SubjectId) -> Self {
        Self {
            id,
            secrets: BTreeMap::new(),
        }
    }

    /// Builder-style helper to add a secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }
}

fn nullable_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}
