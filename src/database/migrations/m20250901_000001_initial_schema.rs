use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_folder_configurations_table(manager).await?;
        self.create_uploads_table(manager).await?;
        self.create_upload_failures_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(UploadFailures::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Uploads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FolderConfigurations::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    // Helper functions for database-specific types
    fn create_id_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_uuid_fk_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        self.create_id_column(manager, column)
    }

    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    async fn create_folder_configurations_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FolderConfigurations::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, FolderConfigurations::Id)
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FolderConfigurations::Name)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FolderConfigurations::Path)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(FolderConfigurations::CronExpression)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FolderConfigurations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.create_timestamp_column(manager, FolderConfigurations::CreatedAt))
                    .col(self.create_timestamp_column(manager, FolderConfigurations::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_uploads_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Uploads::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, Uploads::Id).primary_key())
                    .col(self.create_uuid_fk_column(manager, Uploads::FolderConfigId))
                    .col(ColumnDef::new(Uploads::ItemName).string().not_null())
                    .col(ColumnDef::new(Uploads::ItemPath).string().not_null())
                    .col(ColumnDef::new(Uploads::Status).string().not_null())
                    .col(ColumnDef::new(Uploads::ExternalId).string())
                    .col(ColumnDef::new(Uploads::ErrorMessage).text())
                    .col(ColumnDef::new(Uploads::Metadata).text().not_null())
                    .col(self.create_timestamp_column(manager, Uploads::StartedAt))
                    .col(self.create_nullable_timestamp_column(manager, Uploads::CompletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploads_folder_config_id")
                            .from(Uploads::Table, Uploads::FolderConfigId)
                            .to(FolderConfigurations::Table, FolderConfigurations::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_upload_failures_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadFailures::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, UploadFailures::Id).primary_key())
                    .col(self.create_uuid_fk_column(manager, UploadFailures::FolderConfigId))
                    .col(ColumnDef::new(UploadFailures::ItemName).string().not_null())
                    .col(
                        ColumnDef::new(UploadFailures::ItemPath)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UploadFailures::ErrorMessage)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UploadFailures::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.create_nullable_timestamp_column(manager, UploadFailures::LastRetryAt))
                    .col(ColumnDef::new(UploadFailures::Metadata).text())
                    .col(self.create_timestamp_column(manager, UploadFailures::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_upload_failures_folder_config_id")
                            .from(UploadFailures::Table, UploadFailures::FolderConfigId)
                            .to(FolderConfigurations::Table, FolderConfigurations::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_folder_configurations_is_active")
                    .table(FolderConfigurations::Table)
                    .col(FolderConfigurations::IsActive)
                    .to_owned(),
            )
            .await?;

        // Dedup lookups go through (item_path, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_uploads_item_path_status")
                    .table(Uploads::Table)
                    .col(Uploads::ItemPath)
                    .col(Uploads::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_uploads_folder_config_id")
                    .table(Uploads::Table)
                    .col(Uploads::FolderConfigId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_upload_failures_folder_config_id")
                    .table(UploadFailures::Table)
                    .col(UploadFailures::FolderConfigId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum FolderConfigurations {
    Table,
    Id,
    Name,
    Path,
    CronExpression,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Uploads {
    Table,
    Id,
    FolderConfigId,
    ItemName,
    ItemPath,
    Status,
    ExternalId,
    ErrorMessage,
    Metadata,
    StartedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum UploadFailures {
    Table,
    Id,
    FolderConfigId,
    ItemName,
    ItemPath,
    ErrorMessage,
    RetryCount,
    LastRetryAt,
    Metadata,
    CreatedAt,
}
