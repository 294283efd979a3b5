use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "uploads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub folder_config_id: Uuid,
    pub item_name: String,
    pub item_path: String,
    pub status: String,
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    /// JSON snapshot of the item metadata
    pub metadata: String,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
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
