use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_locations_table::Migration),
            Box::new(m20250301_000002_create_items_table::Migration),
            Box::new(m20250301_000003_add_item_location_column::Migration),
            Box::new(m20250301_000004_create_catalog_products_table::Migration),
            Box::new(m20250301_000005_create_chores_table::Migration),
        ]
    }
}

mod m20250301_000001_create_locations_table {

    use sea_orm::DbBackend;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_locations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut name = ColumnDef::new(Locations::Name);
            name.string().not_null().unique_key();
            // Postgres has no NOCASE collation; the registry checks case-insensitively anyway.
            if manager.get_database_backend() == DbBackend::Sqlite {
                name.extra("COLLATE NOCASE");
            }

            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Locations::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(&mut name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Locations {
        Table,
        Id,
        Name,
    }
}

mod m20250301_000002_create_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Pantry databases created before locations existed already have this
            // table; `if_not_exists` keeps their rows.
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Items::Barcode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(
                            ColumnDef::new(Items::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Items::LastScanned)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Items {
        Table,
        Barcode,
        Name,
        Quantity,
        LastScanned,
    }
}

mod m20250301_000003_add_item_location_column {

    use sea_orm::DbBackend;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_add_item_location_column"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let sqlite = manager.get_database_backend() == DbBackend::Sqlite;

            if !manager
                .has_column("items", Items::LocationId.to_string().as_str())
                .await?
            {
                let mut col = ColumnDef::new(Items::LocationId);
                col.integer().null();
                // SQLite only accepts the constraint inline with the new column.
                if sqlite {
                    col.extra("REFERENCES locations(id) ON DELETE SET NULL");
                }
                manager
                    .alter_table(
                        Table::alter()
                            .table(Items::Table)
                            .add_column(col)
                            .to_owned(),
                    )
                    .await?;

                if !sqlite {
                    manager
                        .create_foreign_key(
                            ForeignKey::create()
                                .name("fk_items_location_id")
                                .from(Items::Table, Items::LocationId)
                                .to(Locations::Table, Locations::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .to_owned(),
                        )
                        .await?;
                }
            }

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_location_id")
                        .table(Items::Table)
                        .col(Items::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(Index::drop().name("idx_items_location_id").to_owned())
                .await?;

            // SQLite refuses to drop a column that carries a foreign key. The column
            // stays, and the has_column guard skips it when this migration runs again.
            if manager.get_database_backend() == DbBackend::Sqlite {
                return Ok(());
            }

            manager
                .alter_table(
                    Table::alter()
                        .table(Items::Table)
                        .drop_column(Items::LocationId)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(Iden)]
    enum Items {
        Table,
        LocationId,
    }

    #[derive(Iden)]
    enum Locations {
        Table,
        Id,
    }
}

mod m20250301_000004_create_catalog_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_catalog_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Mirrors the slim product dump the catalog importer produces.
            manager
                .create_table(
                    Table::create()
                        .table(CatalogProducts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogProducts::Code)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(CatalogProducts::Name).string().null())
                        .col(ColumnDef::new(CatalogProducts::Brand).string().null())
                        .col(ColumnDef::new(CatalogProducts::Quantity).string().null())
                        .col(ColumnDef::new(CatalogProducts::Categories).text().null())
                        .col(ColumnDef::new(CatalogProducts::EnergyKcal100g).double().null())
                        .col(ColumnDef::new(CatalogProducts::Fat100g).double().null())
                        .col(ColumnDef::new(CatalogProducts::SaturatedFat100g).double().null())
                        .col(ColumnDef::new(CatalogProducts::Carbs100g).double().null())
                        .col(ColumnDef::new(CatalogProducts::Sugars100g).double().null())
                        .col(ColumnDef::new(CatalogProducts::Proteins100g).double().null())
                        .col(ColumnDef::new(CatalogProducts::Salt100g).double().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CatalogProducts::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum CatalogProducts {
        Table,
        Code,
        Name,
        Brand,
        Quantity,
        Categories,
        #[iden = "energy_kcal_100g"]
        EnergyKcal100g,
        #[iden = "fat_100g"]
        Fat100g,
        #[iden = "saturated_fat_100g"]
        SaturatedFat100g,
        #[iden = "carbs_100g"]
        Carbs100g,
        #[iden = "sugars_100g"]
        Sugars100g,
        #[iden = "proteins_100g"]
        Proteins100g,
        #[iden = "salt_100g"]
        Salt100g,
    }
}

mod m20250301_000005_create_chores_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000005_create_chores_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Chores::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Chores::ChoreId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Chores::Description).string_len(500).not_null())
                        .col(ColumnDef::new(Chores::PersonId).integer().null())
                        .col(ColumnDef::new(Chores::Frequency).string_len(50).not_null())
                        .col(ColumnDef::new(Chores::DisplayOrder).integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_chores_display_order")
                        .table(Chores::Table)
                        .col(Chores::DisplayOrder)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Chores::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Chores {
        Table,
        ChoreId,
        Description,
        PersonId,
        Frequency,
        DisplayOrder,
    }
}
