use std::collections::BTreeSet;

/// Operator identity configuration, read once at startup.
///
/// This is the single source of truth for "is this an operator": the
/// dispatcher's admin-menu predicate and the orders API authorization
/// middleware both consume it. No handler does its own id comparison.
#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    chat_ids: BTreeSet<String>,
    api_token: Option<String>,
}

impl AdminConfig {
    pub fn new(chat_ids: impl IntoIterator<Item = String>, api_token: Option<String>) -> Self {
        Self {
            chat_ids: chat_ids.into_iter().collect(),
            api_token,
        }
    }

    /// Reads `ADMIN_CHAT_IDS` (comma separated) and `ADMIN_API_TOKEN`.
    pub fn from_env() -> Self {
        let chat_ids = std::env::var("ADMIN_CHAT_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let api_token = std::env::var("ADMIN_API_TOKEN").ok().filter(|t| !t.is_empty());
        Self { chat_ids, api_token }
    }

    /// Pure predicate; no side effects on any state.
    pub fn is_admin_chat(&self, chat_id: &str) -> bool {
        self.chat_ids.contains(chat_id)
    }

    /// Validates an operator bearer token. A missing configured token
    /// means the operator surface is disabled, never open.
    pub fn token_matches(&self, presented: &str) -> bool {
        match &self.api_token {
            Some(expected) => expected == presented,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact() {
        let cfg = AdminConfig::new(["1001".to_string(), "2002".to_string()], None);
        assert!(cfg.is_admin_chat("1001"));
        assert!(!cfg.is_admin_chat("100"));
        assert!(!cfg.is_admin_chat(""));
    }

    #[test]
    fn missing_token_rejects_everything() {
        let cfg = AdminConfig::new([], None);
        assert!(!cfg.token_matches(""));
        assert!(!cfg.token_matches("anything"));
    }

    #[test]
    fn token_compares_exactly() {
        let cfg = AdminConfig::new([], Some("s3cret".into()));
        assert!(cfg.token_matches("s3cret"));
        assert!(!cfg.token_matches("s3cret "));
    }
}
