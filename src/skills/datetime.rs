use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::json;
use tracing::warn;

use super::{Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::Result;

/// Current date and time in the configured timezone.
pub struct DateTimeSkill {
    tz: Tz,
}

impl DateTimeSkill {
    pub fn new(timezone: &str) -> Self {
        let tz = timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!(timezone, "unknown timezone, falling back to UTC");
            Tz::UTC
        });
        Self { tz }
    }
}

impl Skill for DateTimeSkill {
    fn name(&self) -> &str {
        "datetime_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        [Clock::DateTime, Clock::Time, Clock::Date]
            .into_iter()
            .map(|kind| Arc::new(ClockFn { kind, tz: self.tz }) as Arc<dyn SkillFunction>)
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    DateTime,
    Time,
    Date,
}

struct ClockFn {
    kind: Clock,
    tz: Tz,
}

#[async_trait]
impl SkillFunction for ClockFn {
    fn schema(&self) -> ToolSchema {
        match self.kind {
            Clock::DateTime => ToolSchema::new(
                "get_current_datetime",
                "Get the current date and time in a human-readable format",
            ),
            Clock::Time => ToolSchema::new("get_current_time", "Get only the current time"),
            Clock::Date => ToolSchema::new("get_current_date", "Get only the current date"),
        }
    }

    async fn call(&self, _args: ToolArgs) -> Result<ToolOutput> {
        let now = Utc::now().with_timezone(&self.tz);
        let tz = self.tz.name();

        let envelope = match self.kind {
            Clock::DateTime => json!({
                "status": "success",
                "datetime": now.format("%A, %B %d, %Y at %I:%M %p").to_string(),
                "timezone": tz,
            }),
            Clock::Time => json!({
                "status": "success",
                "time": now.format("%I:%M %p").to_string(),
                "timezone": tz,
            }),
            Clock::Date => json!({
                "status": "success",
                "date": now.format("%A, %B %d, %Y").to_string(),
            }),
        };

        Ok(ToolOutput::json(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_three_tools() {
        let skill = DateTimeSkill::new("Asia/Kolkata");
        let names: Vec<_> = skill.tool_schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["get_current_datetime", "get_current_time", "get_current_date"]
        );
        assert!(skill.tool_schemas().iter().all(|s| s.params.is_empty()));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let skill = DateTimeSkill::new("Mars/Olympus_Mons");
        assert_eq!(skill.tz, Tz::UTC);
    }

    #[tokio::test]
    async fn time_envelope() {
        let skill = DateTimeSkill::new("UTC");
        let map = skill.function_map();
        let out = map["get_current_time"].call(ToolArgs::new()).await.unwrap();
        assert!(out.success);
        let v: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert_eq!(v["status"], "success");
        let time = v["time"].as_str().unwrap();
        assert!(time.ends_with("AM") || time.ends_with("PM"));
        assert_eq!(v["timezone"], "UTC");
    }

    #[tokio::test]
    async fn datetime_envelope_contains_at() {
        let skill = DateTimeSkill::new("Asia/Kolkata");
        let map = skill.function_map();
        let out = map["get_current_datetime"].call(ToolArgs::new()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert!(v["datetime"].as_str().unwrap().contains(" at "));
        assert_eq!(v["timezone"], "Asia/Kolkata");
    }
}
