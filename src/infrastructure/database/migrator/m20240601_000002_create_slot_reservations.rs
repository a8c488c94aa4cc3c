//! Create slot_reservations table

use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_time_slots::TimeSlots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SlotReservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SlotReservations::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SlotReservations::SlotId).string().not_null())
                    .col(
                        ColumnDef::new(SlotReservations::Released)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SlotReservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_slot_reservations_slot")
                            .from(SlotReservations::Table, SlotReservations::SlotId)
                            .to(TimeSlots::Table, TimeSlots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_slot_reservations_slot")
                    .table(SlotReservations::Table)
                    .col(SlotReservations::SlotId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SlotReservations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SlotReservations {
    Table,
    Token,
    SlotId,
    Released,
    CreatedAt,
}
