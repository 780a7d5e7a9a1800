use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Package::Table)
                    .if_not_exists()
                    .col(uuid(Package::Id).primary_key())
                    .col(string_len(Package::Title, 200).not_null())
                    .col(string_len(Package::Destination, 120).not_null())
                    .col(integer(Package::DurationDays).not_null())
                    .col(decimal_len(Package::PricePerPerson, 12, 2).not_null())
                    .col(string_len(Package::CurrencyCode, 3).not_null())
                    .col(boolean(Package::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Package::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Seed a starter catalog
        let insert = Query::insert()
            .into_table(Package::Table)
            .columns([
                Package::Id,
                Package::Title,
                Package::Destination,
                Package::DurationDays,
                Package::PricePerPerson,
                Package::CurrencyCode,
            ])
            .values_panic([
                Expr::cust("gen_random_uuid()"),
                "Cancún todo incluido".into(),
                "Cancún".into(),
                5.into(),
                (12500.0).into(),
                "MXN".into(),
            ])
            .values_panic([
                Expr::cust("gen_random_uuid()"),
                "Chichén Itzá y cenotes".into(),
                "Yucatán".into(),
                2.into(),
                (3800.0).into(),
                "MXN".into(),
            ])
            .values_panic([
                Expr::cust("gen_random_uuid()"),
                "Barrancas del Cobre en tren".into(),
                "Chihuahua".into(),
                4.into(),
                (9900.0).into(),
                "MXN".into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Package::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Package {
    Table,
    Id,
    Title,
    Destination,
    DurationDays,
    PricePerPerson,
    CurrencyCode,
    IsActive,
    CreatedAt,
}
