use sea_orm::Schema;
use sea_orm_migration::prelude::*;

mod status_log {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::ForeignKeyAction;
    use uuid::Uuid;

    use crate::m00001_users::user as User;
    use crate::m00002_controllers::controller as Controller;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "status_log")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub controller_id: Uuid,
        pub changed_by: Option<Uuid>,
        pub changed_at: DateTime<Utc>,
        #[sea_orm(column_type = "String(StringLen::N(10))")]
        pub old_status: String,
        #[sea_orm(column_type = "String(StringLen::N(10))")]
        pub new_status: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter)]
    pub enum Relation {
        Controller,
        ChangedBy,
    }

    impl RelationTrait for Relation {
        fn def(&self) -> RelationDef {
            match self {
                Self::Controller => Entity::belongs_to(Controller::Entity)
                    .from(Column::ControllerId)
                    .to(Controller::Column::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .into(),
                Self::ChangedBy => Entity::belongs_to(User::Entity)
                    .from(Column::ChangedBy)
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
        "m00003_status_log"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(status_log::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("status_log__controller_id__id")
                    .table(status_log::Entity)
                    .col(status_log::Column::ControllerId)
                    .col(status_log::Column::Id)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("status_log__changed_at")
                    .table(status_log::Entity)
                    .col(status_log::Column::ChangedAt)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(status_log::Entity).to_owned())
            .await?;
        Ok(())
    }
}
