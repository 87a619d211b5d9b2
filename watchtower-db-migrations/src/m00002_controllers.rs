use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub(crate) mod controller {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::ForeignKeyAction;
    use uuid::Uuid;

    use crate::m00001_users::user as User;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "controllers")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique, column_type = "String(StringLen::N(10))")]
        pub callsign: String,
        #[sea_orm(column_type = "String(StringLen::N(120))")]
        pub name: String,
        #[sea_orm(column_type = "String(StringLen::N(50))")]
        pub note: String,
        pub is_active: bool,
        #[sea_orm(column_type = "String(StringLen::N(10))")]
        pub status: String,
        pub status_changed_at: Option<DateTime<Utc>>,
        pub status_changed_by: Option<Uuid>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter)]
    pub enum Relation {
        ChangedBy,
    }

    impl RelationTrait for Relation {
        fn def(&self) -> RelationDef {
            match self {
                Self::ChangedBy => Entity::belongs_to(User::Entity)
                    .from(Column::StatusChangedBy)
                    .to(User::Column::Id)
                    .on_delete(ForeignKeyAction::SetNull)
                    .into(),
            }
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00002_controllers"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(controller::Entity))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(controller::Entity).to_owned())
            .await?;
        Ok(())
    }
}
