use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000002_create_packages::Package;
use super::m20250301_000005_create_bookings::Booking;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BookingItem::Table)
                    .if_not_exists()
                    .col(uuid(BookingItem::Id).primary_key())
                    .col(uuid(BookingItem::BookingId).not_null())
                    .col(uuid(BookingItem::PackageId).not_null())
                    .col(string_len(BookingItem::Title, 200).not_null())
                    .col(date_null(BookingItem::TravelDate))
                    .col(integer(BookingItem::Adults).not_null())
                    .col(integer(BookingItem::Children).not_null())
                    .col(decimal_len(BookingItem::UnitPrice, 12, 2).not_null())
                    .col(integer(BookingItem::Quantity).not_null().default(1))
                    .col(decimal_len(BookingItem::Subtotal, 12, 2).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_item_booking")
                            .from(BookingItem::Table, BookingItem::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_item_package")
                            .from(BookingItem::Table, BookingItem::PackageId)
                            .to(Package::Table, Package::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookingItem::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BookingItem {
    Table,
    Id,
    BookingId,
    PackageId,
    Title,
    TravelDate,
    Adults,
    Children,
    UnitPrice,
    Quantity,
    Subtotal,
}
