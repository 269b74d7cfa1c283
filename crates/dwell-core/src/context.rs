//! Causation context carried by events, states and fired triggers

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies what caused a change and links it to whatever it causes next.
///
/// A state change carries the context of whoever set it. When a trigger
/// fires because of that change, the invocation carries the same context so
/// the action it starts can be created as a [`Context::child`] of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// User that initiated the change, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Context that caused this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    /// Create a new root context with a fresh ULID
    pub fn new() -> Self {
        Self::with_id(Ulid::new().to_string())
    }

    /// Create a root context with a specific ID
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            parent_id: None,
        }
    }

    /// Create a child context with this context as parent
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            user_id: self.user_id.clone(),
            parent_id: Some(self.id.clone()),
        }
    }

    /// Whether `self` was derived directly from `parent`
    pub fn is_child_of(&self, parent: &Context) -> bool {
        self.parent_id.as_deref() == Some(parent.id.as_str())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_links_to_parent() {
        let root = Context::with_id("root");
        let child = root.child();

        assert_ne!(child.id, root.id);
        assert!(child.is_child_of(&root));
        assert!(!root.is_child_of(&child));
    }

    #[test]
    fn test_fresh_contexts_are_unique() {
        assert_ne!(Context::new().id, Context::new().id);
    }
}
