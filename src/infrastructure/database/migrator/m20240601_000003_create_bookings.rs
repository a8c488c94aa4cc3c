//! Create bookings table
//!
//! `gateway_txn_id` is unique so one gateway transaction can settle at
//! most one booking.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::BookingId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bookings::UserId).string().not_null())
                    .col(ColumnDef::new(Bookings::StationId).string().not_null())
                    .col(ColumnDef::new(Bookings::ChargerType).string().not_null())
                    .col(ColumnDef::new(Bookings::BookingDate).date().not_null())
                    .col(ColumnDef::new(Bookings::BookingTime).time())
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string()
                            .not_null()
                            .default("pending_payment"),
                    )
                    .col(
                        ColumnDef::new(Bookings::PaymentStatus)
                            .string()
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Bookings::AmountPaisa).big_integer())
                    .col(
                        ColumnDef::new(Bookings::ChargingCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Bookings::ChargingCompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Bookings::AdminAmountSet)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Bookings::AdminSetAmountAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Bookings::ActualDurationMinutes).integer())
                    .col(ColumnDef::new(Bookings::SettlementNotes).text())
                    .col(ColumnDef::new(Bookings::GatewayTxnId).string().unique_key())
                    .col(ColumnDef::new(Bookings::PaymentVerifiedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Bookings::GatewayReference).string())
                    .col(ColumnDef::new(Bookings::ReservationToken).string())
                    .col(ColumnDef::new(Bookings::ReviewFlag).text())
                    .col(
                        ColumnDef::new(Bookings::AutoBooked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Bookings::Urgency)
                            .string()
                            .not_null()
                            .default("medium"),
                    )
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, col) in [
            ("idx_bookings_user", Bookings::UserId),
            ("idx_bookings_payment_status", Bookings::PaymentStatus),
            ("idx_bookings_gateway_reference", Bookings::GatewayReference),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Bookings::Table)
                        .col(col)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Bookings {
    Table,
    BookingId,
    UserId,
    StationId,
    ChargerType,
    BookingDate,
    BookingTime,
    Status,
    PaymentStatus,
    AmountPaisa,
    ChargingCompleted,
    ChargingCompletedAt,
    AdminAmountSet,
    AdminSetAmountAt,
    ActualDurationMinutes,
    SettlementNotes,
    GatewayTxnId,
    PaymentVerifiedAt,
    GatewayReference,
    ReservationToken,
    ReviewFlag,
    AutoBooked,
    Urgency,
    CreatedAt,
    UpdatedAt,
    Version,
}
