use async_trait::async_trait;
use db::models::user::Model as User;
use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub subject_id: String,
    pub display_name: Option<String>,
    pub exists: bool,
}

impl DirectoryEntry {
    pub fn missing(subject_id: &str) -> Self {
        Self {
            subject_id: subject_id.to_owned(),
            display_name: None,
            exists: false,
        }
    }
}

/// Identity lookups needed before a subject may check in.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, subject_id: &str) -> Result<DirectoryEntry, DbErr>;
}

/// Directory backed by the `users` table.
#[derive(Clone)]
pub struct DbUserDirectory {
    db: DatabaseConnection,
}

impl DbUserDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for DbUserDirectory {
    async fn lookup(&self, subject_id: &str) -> Result<DirectoryEntry, DbErr> {
        Ok(match User::find_by_subject_id(&self.db, subject_id).await? {
            Some(user) => DirectoryEntry {
                subject_id: user.subject_id,
                display_name: Some(user.display_name),
                exists: true,
            },
            None => DirectoryEntry::missing(subject_id),
        })
    }
}
