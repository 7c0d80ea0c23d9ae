//! Cache categories and their wire names.
//!
//! A category selects a TTL policy and partitions the key namespace so
//! pattern-based clears stay scoped to one class of cached data. Categories
//! are open-ended: unknown names are preserved as `Custom` and fall back to
//! the default TTL policy while keeping their own namespace.

use serde::{Deserialize, Serialize};

/// A class of cached data selecting TTL policy and key namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CacheCategory {
    /// Business record lookups (stable data, long TTL)
    BusinessLookup,
    /// Knowledge-base query results (stable data, longest TTL)
    KnowledgeBase,
    /// Anything without a dedicated policy
    Default,
    /// An unrecognized category name, kept verbatim for namespacing
    Custom(String),
}

impl CacheCategory {
    /// The wire name used in namespaced keys and policy lookups.
    pub fn name(&self) -> &str {
        match self {
            Self::BusinessLookup => "business_lookup",
            Self::KnowledgeBase => "knowledge_base",
            Self::Default => "default",
            Self::Custom(name) => name,
        }
    }

    /// Map a wire name back to a category, preserving unknown names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "business_lookup" => Self::BusinessLookup,
            "knowledge_base" => Self::KnowledgeBase,
            "default" => Self::Default,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for CacheCategory {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<CacheCategory> for String {
    fn from(category: CacheCategory) -> Self {
        category.name().to_string()
    }
}
