use tracing::debug;

use crate::skills::ToolArgs;

/// What the engine should do after a policy has seen the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Proceed,
    /// Stop the turn and ask the user this instead.
    Clarify(String),
}

/// A domain rule applied to one tool's sanitized arguments before the call.
pub trait ArgumentPolicy: Send + Sync {
    /// Name of the tool this policy guards.
    fn tool(&self) -> &str;

    fn apply(&self, args: &mut ToolArgs) -> PolicyOutcome;
}

/// Fills in a default location when the model supplied none.
///
/// If every location key is absent, `target` is set to the configured
/// default.  Without a default the user is asked for one and the tool is
/// not called.
#[derive(Debug, Clone)]
pub struct LocationFallback {
    tool: String,
    keys: Vec<String>,
    target: String,
    default: Option<String>,
    question: String,
}

impl LocationFallback {
    pub fn new(
        tool: impl Into<String>,
        keys: &[&str],
        target: impl Into<String>,
        default: Option<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            target: target.into(),
            default: default.filter(|d| !d.trim().is_empty()),
            question: question.into(),
        }
    }

    /// The `get_weather` rule: `city`/`pincode`, falling back to `city`.
    pub fn weather(default_city: Option<String>) -> Self {
        Self::new(
            "get_weather",
            &["city", "pincode"],
            "city",
            default_city,
            "Which city would you like the weather for?",
        )
    }
}

impl ArgumentPolicy for LocationFallback {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn apply(&self, args: &mut ToolArgs) -> PolicyOutcome {
        if !self.keys.iter().all(|k| args.is_absent(k)) {
            return PolicyOutcome::Proceed;
        }
        match &self.default {
            Some(default) => {
                debug!(tool = %self.tool, key = %self.target, value = %default, "injecting default location");
                args.set(self.target.clone(), default.clone());
                PolicyOutcome::Proceed
            }
            None => PolicyOutcome::Clarify(self.question.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &str) -> ToolArgs {
        ToolArgs::parse(Some(raw)).unwrap()
    }

    #[test]
    fn injects_default_when_all_absent() {
        let policy = LocationFallback::weather(Some("Mumbai".into()));
        let mut a = args(r#"{"city": null}"#);
        assert_eq!(policy.apply(&mut a), PolicyOutcome::Proceed);
        assert_eq!(a.str("city"), Some("Mumbai"));
    }

    #[test]
    fn whitespace_location_counts_as_supplied() {
        let policy = LocationFallback::weather(Some("Mumbai".into()));
        let mut a = args(r#"{"city": "  "}"#);
        assert_eq!(policy.apply(&mut a), PolicyOutcome::Proceed);
        assert_eq!(a.str("city"), Some("  "));

        let policy = LocationFallback::weather(None);
        assert_eq!(policy.apply(&mut args(r#"{"pincode": " "}"#)), PolicyOutcome::Proceed);
    }

    #[test]
    fn leaves_supplied_location_alone() {
        let policy = LocationFallback::weather(Some("Mumbai".into()));
        let mut a = args(r#"{"pincode": "411001"}"#);
        assert_eq!(policy.apply(&mut a), PolicyOutcome::Proceed);
        assert!(a.is_absent("city"));
        assert_eq!(a.str("pincode"), Some("411001"));
    }

    #[test]
    fn asks_without_default() {
        let policy = LocationFallback::weather(None);
        let mut a = args("{}");
        assert_eq!(
            policy.apply(&mut a),
            PolicyOutcome::Clarify("Which city would you like the weather for?".into())
        );
        assert!(a.is_empty());
    }

    #[test]
    fn blank_default_counts_as_none() {
        let policy = LocationFallback::weather(Some("   ".into()));
        assert!(matches!(
            policy.apply(&mut ToolArgs::new()),
            PolicyOutcome::Clarify(_)
        ));
    }
}
