use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Alerts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Alerts::ServiceId).string())
                    .col(ColumnDef::new(Alerts::Category).string())
                    .col(ColumnDef::new(Alerts::Title).string())
                    .col(ColumnDef::new(Alerts::Description).text())
                    .col(ColumnDef::new(Alerts::Priority).string())
                    .col(ColumnDef::new(Alerts::Location).json().not_null())
                    .col(ColumnDef::new(Alerts::Address).string())
                    .col(
                        ColumnDef::new(Alerts::IsAnonymous)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alerts::CitizenId).string())
                    .col(ColumnDef::new(Alerts::Proofs).json_binary().not_null())
                    .col(ColumnDef::new(Alerts::Status).string().not_null())
                    .col(ColumnDef::new(Alerts::Comments).json_binary().not_null())
                    .col(ColumnDef::new(Alerts::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Alerts::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_citizen_id")
                    .table(Alerts::Table)
                    .col(Alerts::CitizenId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_status")
                    .table(Alerts::Table)
                    .col(Alerts::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    ServiceId,
    Category,
    Title,
    Description,
    Priority,
    Location,
    Address,
    IsAnonymous,
    CitizenId,
    Proofs,
    Status,
    Comments,
    CreatedAt,
    UpdatedAt,
}
