//! Subject and consumer-group names used by the purchase saga.

/// Default subject carrying saga commands.
pub const DEFAULT_COMMAND_SUBJECT: &str = "purchase.checkout.command";

/// Default subject carrying saga replies.
pub const DEFAULT_REPLY_SUBJECT: &str = "purchase.checkout.reply";

/// Subjects and consumer groups for one deployment.
///
/// Reads from environment variables:
/// - `PURCHASE_COMMAND_SUBJECT` (default: `"purchase.checkout.command"`)
/// - `PURCHASE_REPLY_SUBJECT` (default: `"purchase.checkout.reply"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaSubjects {
    pub commands: String,
    pub replies: String,
    pub orchestrator_group: String,
    pub capacity_group: String,
    pub purchase_group: String,
}

impl SagaSubjects {
    /// Loads subject names from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            commands: std::env::var("PURCHASE_COMMAND_SUBJECT").unwrap_or(defaults.commands),
            replies: std::env::var("PURCHASE_REPLY_SUBJECT").unwrap_or(defaults.replies),
            ..defaults
        }
    }
}

impl Default for SagaSubjects {
    fn default() -> Self {
        Self {
            commands: DEFAULT_COMMAND_SUBJECT.to_string(),
            replies: DEFAULT_REPLY_SUBJECT.to_string(),
            orchestrator_group: "orchestrator".to_string(),
            capacity_group: "tours_handler_group".to_string(),
            purchase_group: "purchase_handler_group".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let subjects = SagaSubjects::default();
        assert_eq!(subjects.commands, "purchase.checkout.command");
        assert_eq!(subjects.replies, "purchase.checkout.reply");
        assert_eq!(subjects.orchestrator_group, "orchestrator");
    }

    #[test]
    fn test_groups_are_distinct() {
        let subjects = SagaSubjects::default();
        assert_ne!(subjects.capacity_group, subjects.purchase_group);
        assert_ne!(subjects.capacity_group, subjects.orchestrator_group);
        assert_ne!(subjects.purchase_group, subjects.orchestrator_group);
    }
}
