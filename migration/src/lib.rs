pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_customers;
mod m20250301_000002_create_packages;
mod m20250301_000003_create_quotes;
mod m20250301_000004_create_quote_items;
mod m20250301_000005_create_bookings;
mod m20250301_000006_create_booking_items;
mod m20250301_000007_create_payments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_customers::Migration),
            Box::new(m20250301_000002_create_packages::Migration),
            Box::new(m20250301_000003_create_quotes::Migration),
            Box::new(m20250301_000004_create_quote_items::Migration),
            Box::new(m20250301_000005_create_bookings::Migration),
            Box::new(m20250301_000006_create_booking_items::Migration),
            Box::new(m20250301_000007_create_payments::Migration),
        ]
    }
}
