use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One watch-progress record per composite key (`userId:platform:title`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub user_id: String,
    pub platform: String,
    pub title: String,
    pub episode: String,
    pub time: f64,
    pub duration: f64,
    pub liked: bool,
    pub cover: String,
    pub url: String,
    /// Milliseconds since epoch, stamped at ingestion.
    pub last_updated: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
