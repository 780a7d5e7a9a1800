use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20250301_000001_create_customers::Customer;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(QuoteStatus::Enum)
                    .values([
                        QuoteStatus::Draft,
                        QuoteStatus::Accepted,
                        QuoteStatus::Expired,
                        QuoteStatus::Rejected,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Quote::Table)
                    .if_not_exists()
                    .col(uuid(Quote::Id).primary_key())
                    .col(uuid(Quote::CustomerId).not_null())
                    .col(string_len(Quote::CurrencyCode, 3).not_null())
                    .col(decimal_len(Quote::TotalAmount, 12, 2).not_null())
                    .col(
                        ColumnDef::new(Quote::Status)
                            .custom(QuoteStatus::Enum)
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone_null(Quote::ValidUntil))
                    .col(text_null(Quote::Notes))
                    .col(
                        timestamp_with_time_zone(Quote::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_customer")
                            .from(Quote::Table, Quote::CustomerId)
                            .to(Customer::Table, Customer::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Quote::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(QuoteStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Quote {
    Table,
    Id,
    CustomerId,
    CurrencyCode,
    TotalAmount,
    Status,
    ValidUntil,
    Notes,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum QuoteStatus {
    #[sea_orm(iden = "quote_status")]
    Enum,
    #[sea_orm(iden = "draft")]
    Draft,
    #[sea_orm(iden = "accepted")]
    Accepted,
    #[sea_orm(iden = "expired")]
    Expired,
    #[sea_orm(iden = "rejected")]
    Rejected,
}
