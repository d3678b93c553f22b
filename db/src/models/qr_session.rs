use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Server-side record of an issued attendance token.
///
/// Written only through the session store; `consumed` flips false→true once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "qr_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: String,
    pub subject_id: String,
    /// Serialized token exactly as handed to the client, kept for audit.
    #[sea_orm(column_type = "Text")]
    pub raw_payload: String,
    pub integrity_tag: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub origin_ip: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// `now < expires_at`; a session is already invalid at the expiry instant.
    #[inline]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session(expires_at: DateTime<Utc>) -> Model {
        Model {
            session_id: "abc".into(),
            subject_id: "S-001".into(),
            raw_payload: "{}".into(),
            integrity_tag: "00".into(),
            issued_at: expires_at - Duration::seconds(300),
            expires_at,
            consumed: false,
            consumed_at: None,
            origin_ip: None,
        }
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let exp = Utc.with_ymd_and_hms(2024, 1, 1, 8, 5, 0).unwrap();
        let s = session(exp);
        assert!(!s.is_live_at(exp));
        assert!(s.is_live_at(exp - Duration::seconds(1)));
    }
}
