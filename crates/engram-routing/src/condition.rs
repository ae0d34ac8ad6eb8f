//! Declarative routing conditions.
//!
//! Conditions are plain data so routing rules can be listed, serialized, and
//! compared; evaluation is a pure function of `(topic, payload)`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Matches every payload.
    Always,
    TopicEquals { topic: String },
    TopicPrefix { prefix: String },
    /// Payload is an object containing `key`.
    PayloadHasKey { key: String },
    /// Payload object field `key` equals `value`.
    PayloadFieldEquals { key: String, value: Value },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
}

impl Condition {
    pub fn topic(topic: impl Into<String>) -> Self {
        Condition::TopicEquals { topic: topic.into() }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Condition::TopicPrefix { prefix: prefix.into() }
    }

    pub fn has_key(key: impl Into<String>) -> Self {
        Condition::PayloadHasKey { key: key.into() }
    }

    pub fn field_equals(key: impl Into<String>, value: Value) -> Self {
        Condition::PayloadFieldEquals { key: key.into(), value }
    }

    pub fn matches(&self, topic: &str, payload: &Value) -> bool {
        match self {
            Condition::Always => true,
            Condition::TopicEquals { topic: t } => t == topic,
            Condition::TopicPrefix { prefix } => topic.starts_with(prefix.as_str()),
            Condition::PayloadHasKey { key } => payload.get(key).is_some(),
            Condition::PayloadFieldEquals { key, value } => payload.get(key) == Some(value),
            Condition::All { conditions } => conditions.iter().all(|c| c.matches(topic, payload)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.matches(topic, payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_conditions() {
        assert!(Condition::topic("math").matches("math", &json!(null)));
        assert!(!Condition::topic("math").matches("mathematics", &json!(null)));
        assert!(Condition::prefix("sensor.").matches("sensor.lidar", &json!(null)));
    }

    #[test]
    fn payload_conditions() {
        let p = json!({"urgent": true, "kind": "alert"});
        assert!(Condition::has_key("urgent").matches("t", &p));
        assert!(!Condition::has_key("urgent").matches("t", &json!("urgent")));
        assert!(Condition::field_equals("kind", json!("alert")).matches("t", &p));
        assert!(!Condition::field_equals("kind", json!("info")).matches("t", &p));
    }

    #[test]
    fn combinators() {
        let p = json!({"urgent": true});
        let all = Condition::All {
            conditions: vec![Condition::topic("a"), Condition::has_key("urgent")],
        };
        assert!(all.matches("a", &p));
        assert!(!all.matches("b", &p));

        let any = Condition::Any {
            conditions: vec![Condition::topic("x"), Condition::has_key("urgent")],
        };
        assert!(any.matches("b", &p));
        assert!(Condition::All { conditions: vec![] }.matches("t", &p));
        assert!(!Condition::Any { conditions: vec![] }.matches("t", &p));
    }
}
