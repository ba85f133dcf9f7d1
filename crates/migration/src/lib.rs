pub use sea_orm_migration::prelude::*;

mod m001_create_worker_table;

pub use m001_create_worker_table::WORKER_TABLE;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m001_create_worker_table::Migration)]
    }
}
