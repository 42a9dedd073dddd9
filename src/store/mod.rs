// Sqlite-backed local progress store, the on-device source of truth

use anyhow::Context;
use entities::progress::{self, Entity as Progress};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, QueryOrder,
};

use crate::domain::mapping::entry_from_row;
use crate::domain::models::ProgressEntry;

#[derive(Clone)]
pub struct LocalStore {
    db: DatabaseConnection,
}

impl LocalStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<ProgressEntry>> {
        let row = Progress::find_by_id(key)
            .one(&self.db)
            .await
            .with_context(|| format!("failed to load progress entry {}", key))?;
        Ok(row.map(entry_from_row))
    }

    /// Create-or-replace by key. All columns are overwritten; preserving the
    /// `liked` flag across observations is the ingest pipeline's job.
    pub async fn upsert(
        &self,
        key: &str,
        user_id: &str,
        entry: &ProgressEntry,
    ) -> anyhow::Result<()> {
        let model = progress::ActiveModel {
            key: Set(key.to_string()),
            user_id: Set(user_id.to_string()),
            platform: Set(entry.platform.clone()),
            title: Set(entry.title.clone()),
            episode: Set(entry.episode.clone()),
            time: Set(entry.time),
            duration: Set(entry.duration),
            liked: Set(entry.liked),
            cover: Set(entry.cover.clone()),
            url: Set(entry.url.clone()),
            last_updated: Set(entry.last_updated),
        };
        Progress::insert(model)
            .on_conflict(
                OnConflict::column(progress::Column::Key)
                    .update_columns([
                        progress::Column::UserId,
                        progress::Column::Platform,
                        progress::Column::Title,
                        progress::Column::Episode,
                        progress::Column::Time,
                        progress::Column::Duration,
                        progress::Column::Liked,
                        progress::Column::Cover,
                        progress::Column::Url,
                        progress::Column::LastUpdated,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .with_context(|| format!("failed to upsert progress entry {}", key))?;
        Ok(())
    }

    pub async fn set_liked(&self, key: &str, liked: bool) -> anyhow::Result<Option<ProgressEntry>> {
        let Some(row) = Progress::find_by_id(key)
            .one(&self.db)
            .await
            .with_context(|| format!("failed to load progress entry {}", key))?
        else {
            return Ok(None);
        };
        let mut active: progress::ActiveModel = row.into();
        active.liked = Set(liked);
        let updated = active
            .update(&self.db)
            .await
            .with_context(|| format!("failed to update liked flag for {}", key))?;
        Ok(Some(entry_from_row(updated)))
    }

    /// Full dump, most recently updated first.
    pub async fn all(&self) -> anyhow::Result<Vec<(String, ProgressEntry)>> {
        let rows = Progress::find()
            .order_by_desc(progress::Column::LastUpdated)
            .all(&self.db)
            .await
            .context("failed to list progress entries")?;
        Ok(rows
            .into_iter()
            .map(|row| (row.key.clone(), entry_from_row(row)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;

    async fn memory_store() -> LocalStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        LocalStore::new(db)
    }

    fn entry(title: &str, time: f64) -> ProgressEntry {
        ProgressEntry {
            title: title.into(),
            episode: "1".into(),
            time,
            duration: 1400.0,
            liked: false,
            cover: String::new(),
            url: format!("https://x.example/watch/{}", title),
            platform: "X".into(),
            last_updated: 1_000,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_key() {
        let store = memory_store().await;
        let key = "local:X:Show A";
        store.upsert(key, "local", &entry("Show A", 120.0)).await.unwrap();

        let mut second = entry("Show A", 300.0);
        second.last_updated = 2_000;
        store.upsert(key, "local", &second).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        let (stored_key, stored) = &all[0];
        assert_eq!(stored_key, key);
        assert_eq!(stored.time, 300.0);
        assert_eq!(stored.last_updated, 2_000);
    }

    #[tokio::test]
    async fn set_liked_flips_only_the_flag() {
        let store = memory_store().await;
        let key = "local:X:Show A";
        store.upsert(key, "local", &entry("Show A", 120.0)).await.unwrap();

        let updated = store.set_liked(key, true).await.unwrap().unwrap();
        assert!(updated.liked);
        assert_eq!(updated.time, 120.0);

        assert!(store.set_liked("local:X:absent", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn all_orders_most_recent_first() {
        let store = memory_store().await;
        let mut a = entry("Show A", 10.0);
        a.last_updated = 1_000;
        let mut b = entry("Show B", 20.0);
        b.last_updated = 3_000;
        store.upsert("local:X:Show A", "local", &a).await.unwrap();
        store.upsert("local:X:Show B", "local", &b).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all[0].0, "local:X:Show B");
        assert_eq!(all[1].0, "local:X:Show A");
    }
}
