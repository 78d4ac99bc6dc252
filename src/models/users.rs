use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "partner_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    PendingSent,
    PendingReceived,
    Connected,
    Invited,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::PendingSent => "pending_sent",
            PartnerStatus::PendingReceived => "pending_received",
            PartnerStatus::Connected => "connected",
            PartnerStatus::Invited => "invited",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_notifications: bool,
    pub partner_id: Option<Uuid>,
    pub partner_email: Option<String>,
    pub partner_status: Option<PartnerStatus>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            email_notifications: true,
            partner_id: None,
            partner_email: None,
            partner_status: None,
            created_at: now,
        }
    }

    /// The partner id, but only once both sides have accepted.
    pub fn connected_partner(&self) -> Option<Uuid> {
        match (self.partner_id, self.partner_status) {
            (Some(partner_id), Some(PartnerStatus::Connected)) => Some(partner_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerLink {
    pub partner_id: Option<Uuid>,
    pub partner_email: Option<String>,
    pub status: PartnerStatus,
}

impl PartnerLink {
    pub fn with_user(partner_id: Uuid, status: PartnerStatus) -> Self {
        Self {
            partner_id: Some(partner_id),
            partner_email: None,
            status,
        }
    }

    pub fn invited(partner_email: String) -> Self {
        Self {
            partner_id: None,
            partner_email: Some(partner_email),
            status: PartnerStatus::Invited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_partner_is_not_connected() {
        let mut user = User::new("A".into(), "a@example.com".into(), "x".into(), Utc::now());
        assert_eq!(user.connected_partner(), None);

        let partner = Uuid::new_v4();
        user.partner_id = Some(partner);
        user.partner_status = Some(PartnerStatus::PendingSent);
        assert_eq!(user.connected_partner(), None);

        user.partner_status = Some(PartnerStatus::Connected);
        assert_eq!(user.connected_partner(), Some(partner));
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User::new("A".into(), "a@example.com".into(), "secret-hash".into(), Utc::now());
        let json = serde_json::to_value(&user).expect("json");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email_notifications"], true);
    }
}
