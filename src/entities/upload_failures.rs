use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "upload_failures")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub folder_config_id: Uuid,
    pub item_name: String,
    #[sea_orm(unique)]
    pub item_path: String,
    pub error_message: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTimeUtc>,
    /// JSON snapshot of the item metadata, absent when the descriptor was unreadable
    pub metadata: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::folder_configurations::Entity",
        from = "Column::FolderConfigId",
        to = "super::folder_configurations::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    FolderConfigurations,
}

impl Related<super::folder_configurations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FolderConfigurations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
