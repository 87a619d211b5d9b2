use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::ForeignKeyAction;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "access_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub label: String,
    /// SHA-256 of the bearer secret, hex encoded. The secret itself is never stored.
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() & !self.is_expired_at(now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    User,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::User => Entity::belongs_to(super::User::Entity)
                .from(Column::UserId)
                .to(super::User::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
        }
    }
}

impl Related<super::User::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn token(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> Model {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            label: "script".into(),
            token_hash: "0".repeat(64),
            created_at,
            expires_at,
            revoked_at,
            last_used_at: None,
        }
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let expiry = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let t = token(Some(expiry), None);
        assert!(t.is_active_at(expiry - Duration::seconds(1)));
        assert!(!t.is_active_at(expiry));
        assert!(!t.is_active_at(expiry + Duration::hours(1)));
    }

    #[test]
    fn no_expiry_means_active_until_revoked() {
        let now = Utc.with_ymd_and_hms(2090, 1, 1, 0, 0, 0).unwrap();
        assert!(token(None, None).is_active_at(now));
        assert!(!token(None, Some(now)).is_active_at(now));
    }

    #[test]
    fn revoked_is_inactive_even_before_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t = token(Some(now + Duration::days(1)), Some(now - Duration::hours(1)));
        assert!(!t.is_active_at(now));
    }

    #[test]
    fn digest_is_not_serialized() {
        let json = serde_json::to_value(token(None, None)).unwrap();
        assert!(json.get("token_hash").is_none());
        assert_eq!(json["label"], "script");
    }
}
