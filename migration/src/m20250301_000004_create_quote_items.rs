use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000002_create_packages::Package;
use super::m20250301_000003_create_quotes::Quote;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuoteItem::Table)
                    .if_not_exists()
                    .col(uuid(QuoteItem::Id).primary_key())
                    .col(uuid(QuoteItem::QuoteId).not_null())
                    .col(uuid(QuoteItem::PackageId).not_null())
                    .col(string_len(QuoteItem::Title, 200).not_null())
                    .col(date_null(QuoteItem::TravelDate))
                    .col(integer(QuoteItem::Adults).not_null())
                    .col(integer(QuoteItem::Children).not_null())
                    .col(decimal_len(QuoteItem::UnitPrice, 12, 2).not_null())
                    .col(integer(QuoteItem::Quantity).not_null().default(1))
                    .col(decimal_len(QuoteItem::Subtotal, 12, 2).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_item_quote")
                            .from(QuoteItem::Table, QuoteItem::QuoteId)
                            .to(Quote::Table, Quote::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_item_package")
                            .from(QuoteItem::Table, QuoteItem::PackageId)
                            .to(Package::Table, Package::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuoteItem::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum QuoteItem {
    Table,
    Id,
    QuoteId,
    PackageId,
    Title,
    TravelDate,
    Adults,
    Children,
    UnitPrice,
    Quantity,
    Subtotal,
}
