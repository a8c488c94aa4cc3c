//! Create time_slots table
//!
//! Capacity ledger of the slot grid. The reserved_count never exceeds
//! total_capacity; increments are conditional UPDATEs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TimeSlots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimeSlots::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TimeSlots::StationId).string().not_null())
                    .col(ColumnDef::new(TimeSlots::ChargerType).string().not_null())
                    .col(ColumnDef::new(TimeSlots::SlotDate).date().not_null())
                    .col(ColumnDef::new(TimeSlots::SlotTime).time().not_null())
                    .col(
                        ColumnDef::new(TimeSlots::TotalCapacity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimeSlots::ReservedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_time_slots_bucket")
                    .table(TimeSlots::Table)
                    .col(TimeSlots::StationId)
                    .col(TimeSlots::ChargerType)
                    .col(TimeSlots::SlotDate)
                    .col(TimeSlots::SlotTime)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TimeSlots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TimeSlots {
    Table,
    Id,
    StationId,
    ChargerType,
    SlotDate,
    SlotTime,
    TotalCapacity,
    ReservedCount,
}
