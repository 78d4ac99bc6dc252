use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_from: Option<Uuid>,
}

impl Message {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            sender_id,
            receiver_id,
            created_at: now,
            is_read: false,
            scheduled_from: None,
        }
    }

    /// The live message a due scheduled message turns into.
    pub fn from_scheduled(scheduled: &ScheduledMessage, now: DateTime<Utc>) -> Self {
        Self {
            scheduled_from: Some(scheduled.id),
            ..Self::new(
                scheduled.sender_id,
                scheduled.receiver_id,
                scheduled.content.clone(),
                now,
            )
        }
    }
}

/// `Sending` is the worker's claim: a record in that state is owned by
/// exactly one worker pass and can no longer be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scheduled_message_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScheduledMessageStatus {
    Pending,
    Sending,
    Sent,
    Cancelled,
    Failed,
}

impl ScheduledMessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduledMessageStatus::Sent
                | ScheduledMessageStatus::Cancelled
                | ScheduledMessageStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ScheduledMessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl ScheduledMessage {
    pub fn new(
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        scheduled_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            sender_id,
            receiver_id,
            scheduled_time,
            created_at: now,
            status: ScheduledMessageStatus::Pending,
            error: None,
            sent_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduledMessageStatus::Pending && self.scheduled_time <= now
    }
}

/// Accepts RFC 3339 timestamps; a timestamp without an offset is read as UTC.
pub fn parse_scheduled_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!("'{}' is not an ISO-8601 timestamp", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 20, 14, 30, 0).unwrap();
        assert_eq!(parse_scheduled_time("2026-10-20T14:30:00Z").unwrap(), expected);
        assert_eq!(
            parse_scheduled_time("2026-10-20T10:30:00-04:00").unwrap(),
            expected
        );
        assert_eq!(parse_scheduled_time("2026-10-20T14:30:00").unwrap(), expected);
        assert_eq!(parse_scheduled_time("2026-10-20T14:30").unwrap(), expected);
        assert!(parse_scheduled_time("tomorrow at noon").is_err());
    }

    #[test]
    fn only_pending_records_in_the_past_are_due() {
        let now = Utc::now();
        let mut scheduled = ScheduledMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "hi".into(),
            now - Duration::seconds(1),
            now - Duration::minutes(5),
        );
        assert!(scheduled.is_due(now));
        assert!(!scheduled.is_due(now - Duration::minutes(1)));

        scheduled.status = ScheduledMessageStatus::Cancelled;
        assert!(!scheduled.is_due(now));
        assert!(scheduled.status.is_terminal());
        assert!(!ScheduledMessageStatus::Sending.is_terminal());
    }

    #[test]
    fn materialized_message_points_back_to_its_schedule() {
        let now = Utc::now();
        let scheduled = ScheduledMessage::new(Uuid::new_v4(), Uuid::new_v4(), "later".into(), now, now);
        let message = Message::from_scheduled(&scheduled, now);
        assert_eq!(message.scheduled_from, Some(scheduled.id));
        assert_eq!(message.sender_id, scheduled.sender_id);
        assert_eq!(message.content, "later");
        assert!(!message.is_read);
    }

    #[test]
    fn scheduled_json_omits_absent_optional_fields() {
        let now = Utc::now();
        let scheduled = ScheduledMessage::new(Uuid::new_v4(), Uuid::new_v4(), "x".into(), now, now);
        let json = serde_json::to_value(&scheduled).expect("json");
        assert_eq!(json["status"], "pending");
        assert!(json.get("sent_at").is_none());
        assert!(json.get("error").is_none());
    }
}
