//! Fixture helpers shared by the integration suite.

use sqlx::{Pool, Postgres};

use crate::model::{ColumnType, EntityModel, ModelRegistry};
use crate::Result;

/// Creates the tables the integration tests query against.
pub async fn create_fixture_tables(pool: &Pool<Postgres>) -> Result<()> {
    let ddl = [
        "create table if not exists people (
            id int primary key,
            full_name text not null,
            active boolean not null default true
        )",
        "create table if not exists customers (
            id int primary key,
            name text not null
        )",
        "create table if not exists orders (
            id int primary key,
            amount int not null,
            customer_id int not null references customers(id)
        )",
        "create table if not exists sales (
            id int primary key,
            region text not null,
            amount int not null
        )",
    ];
    for stmt in ddl {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

/// Entity mappings matching [`create_fixture_tables`].
pub fn fixture_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register(
        EntityModel::new("Person", "people")
            .column("id", ColumnType::Integer)
            .column_as("name", "full_name", ColumnType::Text)
            .column("active", ColumnType::Boolean),
    );
    registry.register(
        EntityModel::new("Customer", "customers")
            .column("id", ColumnType::Integer)
            .column("name", ColumnType::Text),
    );
    registry.register(
        EntityModel::new("Order", "orders")
            .column("id", ColumnType::Integer)
            .column("amount", ColumnType::Integer)
            .belongs_to("customer", "Customer", "customer_id", "id"),
    );
    registry.register(
        EntityModel::new("Sale", "sales")
            .column("id", ColumnType::Integer)
            .column("region", ColumnType::Text)
            .column("amount", ColumnType::Integer),
    );
    registry
}
