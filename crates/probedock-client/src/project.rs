//! Project profile: identifies the project results are published for.

use serde::{Deserialize, Serialize};

use crate::error::{ProbeDockError, ProbeDockResult};
use crate::meta::one_or_many;

/// Project profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProfile {
    /// Version of the project under test (e.g. "1.2.3").
    #[serde(default)]
    pub version: Option<String>,

    /// API identifier of the project on the collector.
    #[serde(default)]
    pub api_id: Option<String>,

    /// Default category for every result.
    #[serde(default)]
    pub category: Option<String>,

    /// Tags added to every result.
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,

    /// Tickets added to every result.
    #[serde(default, deserialize_with = "one_or_many")]
    pub tickets: Vec<String>,
}

impl ProjectProfile {
    pub fn new(version: impl Into<String>, api_id: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            api_id: Some(api_id.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tickets<I, S>(mut self, tickets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickets = tickets.into_iter().map(Into::into).collect();
        self
    }

    /// Ensure the profile can be serialized into a payload.
    pub fn validate(&self) -> ProbeDockResult<()> {
        let required = [
            ("version", self.version.as_deref()),
            ("API identifier", self.api_id.as_deref()),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.map(str::trim).unwrap_or_default().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProbeDockError::Payload {
                message: format!("Missing project options: {}", missing.join(", ")),
            })
        }
    }
}
