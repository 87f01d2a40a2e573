use crate::entities::prelude::*;
use crate::entities::{catalog_records, category_bindings};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(CollectSources)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Categories)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(CategoryBindings)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(CatalogRecords)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(CollectRuns)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Two concurrent runs must not both insert the same record.
        manager
            .create_index(
                Index::create()
                    .name("idx_catalog_records_kind_dedup_key")
                    .table(CatalogRecords)
                    .col(catalog_records::Column::Kind)
                    .col(catalog_records::Column::DedupKey)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_catalog_records_kind_name")
                    .table(CatalogRecords)
                    .col(catalog_records::Column::Kind)
                    .col(catalog_records::Column::Name)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_category_bindings_source")
                    .table(CategoryBindings)
                    .col(category_bindings::Column::SourceId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CollectRuns).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CatalogRecords).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CategoryBindings).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CollectSources).to_owned())
            .await
    }
}
