pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20251001_000001_urls_table;
mod m20251001_000002_last_visited_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_urls_table::Migration),
            Box::new(m20251001_000002_last_visited_index::Migration),
        ]
    }
}
