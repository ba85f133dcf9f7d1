use sea_orm_migration::prelude::*;

/// Name of the table backing the worker resource.
pub const WORKER_TABLE: &str = "worker";

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_create_worker_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Portable across PostgreSQL and SQLite.
        manager
            .create_table(
                Table::create()
                    .table(Worker::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Worker::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Worker::FirstName).string().not_null().default(""))
                    .col(ColumnDef::new(Worker::LastName).string().not_null().default(""))
                    .col(ColumnDef::new(Worker::City).string().not_null().default(""))
                    .col(ColumnDef::new(Worker::Division).string().not_null().default(""))
                    .col(ColumnDef::new(Worker::Position).string().not_null().default(""))
                    .col(
                        ColumnDef::new(Worker::Salary)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Worker::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Worker::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Worker::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Worker::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_worker_deleted_at")
                    .table(Worker::Table)
                    .col(Worker::DeletedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Worker::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Worker {
    Table,
    Username,
    FirstName,
    LastName,
    City,
    Division,
    Position,
    Salary,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
    Version,
}
