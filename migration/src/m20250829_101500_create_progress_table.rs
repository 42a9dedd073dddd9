use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Progress::Table)
                    .if_not_exists()
                    .col(string(Progress::Key).primary_key())
                    .col(string(Progress::UserId))
                    .col(string(Progress::Platform))
                    .col(string(Progress::Title))
                    .col(string(Progress::Episode))
                    .col(double(Progress::Time))
                    .col(double(Progress::Duration))
                    .col(boolean(Progress::Liked))
                    .col(string(Progress::Cover))
                    .col(string(Progress::Url))
                    .col(big_integer(Progress::LastUpdated))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Progress::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Progress {
    Table,
    Key,
    UserId,
    Platform,
    Title,
    Episode,
    Time,
    Duration,
    Liked,
    Cover,
    Url,
    LastUpdated,
}
