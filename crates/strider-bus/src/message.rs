use serde::{Deserialize, Serialize};

use strider_model::{Job, JobState};

/// Envelope published to the jobs exchange for every state change.
///
/// Field names are part of the wire contract shared with the other platform
/// services, hence the PascalCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateMessage {
    pub job: Job,
    pub state: JobState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sender: String,
}

/// Payload of a time-limit-delta request.
///
/// The delta is a human-readable duration string such as `"30m"` or
/// `"1h10m"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeLimitDelta {
    pub delta: String,
}

/// Reply to a time-limit query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeLimitResponse {
    pub milliseconds_remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job() -> Job {
        Job {
            invocation_id: Uuid::parse_str("07b04ce2-7757-4b21-9e15-0b4c2f44be26").unwrap(),
            submitter: "tester".into(),
            ..Default::default()
        }
    }

    #[test]
    fn update_message_uses_wire_field_names() {
        let update = UpdateMessage {
            job: job(),
            state: JobState::Running,
            message: "Pulling image".into(),
            sender: "host-1".into(),
        };

        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"Job\""));
        assert!(json.contains("\"State\":\"Running\""));
        assert!(json.contains("\"Message\":\"Pulling image\""));
        assert!(json.contains("\"Sender\":\"host-1\""));
    }

    #[test]
    fn update_message_roundtrip() {
        let update = UpdateMessage {
            job: job(),
            state: JobState::Failed,
            message: "Job exited with a status of 4".into(),
            sender: "host-1".into(),
        };

        let json = serde_json::to_string(&update).unwrap();
        let back: UpdateMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(update, back);
    }

    #[test]
    fn time_limit_delta_decodes_wire_payload() {
        let delta: TimeLimitDelta = serde_json::from_str(r#"{"Delta": "9h30m"}"#).unwrap();
        assert_eq!(delta.delta, "9h30m");
    }

    #[test]
    fn time_limit_response_encodes_milliseconds() {
        let json = serde_json::to_string(&TimeLimitResponse {
            milliseconds_remaining: 1500,
        })
        .unwrap();
        assert_eq!(json, r#"{"MillisecondsRemaining":1500}"#);
    }
}
