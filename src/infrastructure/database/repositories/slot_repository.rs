//! SeaORM implementation of SlotRepository
//!
//! Capacity is taken with a conditional UPDATE
//! (`reserved_count < total_capacity`) inside a transaction, so concurrent
//! reservations of the last unit cannot both succeed.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::domain::slot::{SlotKey, SlotRepository, TimeSlot};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::{slot_reservation, time_slot};

use super::db_err;

pub struct SeaOrmSlotRepository {
    db: DatabaseConnection,
}

impl SeaOrmSlotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn slot_id(key: &SlotKey) -> String {
    key.to_string()
}

fn model_to_domain(m: time_slot::Model) -> TimeSlot {
    TimeSlot {
        key: SlotKey::new(m.station_id, m.charger_type, m.slot_date, m.slot_time),
        total_capacity: m.total_capacity.max(0) as u32,
        reserved_count: m.reserved_count.max(0) as u32,
    }
}

#[async_trait]
impl SlotRepository for SeaOrmSlotRepository {
    async fn try_reserve(&self, key: &SlotKey, capacity: u32, token: Uuid) -> DomainResult<bool> {
        let id = slot_id(key);
        let txn = self.db.begin().await.map_err(db_err)?;

        let bucket = time_slot::ActiveModel {
            id: Set(id.clone()),
            station_id: Set(key.station_id.clone()),
            charger_type: Set(key.charger_type.clone()),
            slot_date: Set(key.date),
            slot_time: Set(key.time),
            total_capacity: Set(capacity as i32),
            reserved_count: Set(0),
        };
        time_slot::Entity::insert(bucket)
            .on_conflict(
                OnConflict::column(time_slot::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(db_err)?;

        // Station configuration is the source of truth for capacity
        time_slot::Entity::update_many()
            .col_expr(time_slot::Column::TotalCapacity, Expr::value(capacity as i32))
            .filter(time_slot::Column::Id.eq(id.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let taken = time_slot::Entity::update_many()
            .col_expr(
                time_slot::Column::ReservedCount,
                Expr::col(time_slot::Column::ReservedCount).add(1),
            )
            .filter(time_slot::Column::Id.eq(id.as_str()))
            .filter(
                Expr::col(time_slot::Column::ReservedCount)
                    .lt(Expr::col(time_slot::Column::TotalCapacity)),
            )
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if taken.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            debug!("Slot {} is full", id);
            return Ok(false);
        }

        slot_reservation::Entity::insert(slot_reservation::ActiveModel {
            token: Set(token.to_string()),
            slot_id: Set(id),
            released: Set(false),
            created_at: Set(Utc::now()),
        })
        .exec_without_returning(&txn)
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn release(&self, token: Uuid) -> DomainResult<bool> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let held = slot_reservation::Entity::find_by_id(token.to_string())
            .filter(slot_reservation::Column::Released.eq(false))
            .one(&txn)
            .await
            .map_err(db_err)?;
        let Some(held) = held else {
            txn.rollback().await.map_err(db_err)?;
            return Ok(false);
        };

        let flipped = slot_reservation::Entity::update_many()
            .col_expr(slot_reservation::Column::Released, Expr::value(true))
            .filter(slot_reservation::Column::Token.eq(held.token.as_str()))
            .filter(slot_reservation::Column::Released.eq(false))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if flipped.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        time_slot::Entity::update_many()
            .col_expr(
                time_slot::Column::ReservedCount,
                Expr::col(time_slot::Column::ReservedCount).sub(1),
            )
            .filter(time_slot::Column::Id.eq(held.slot_id.as_str()))
            .filter(time_slot::Column::ReservedCount.gt(0))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn is_held(&self, token: Uuid) -> DomainResult<bool> {
        let held = slot_reservation::Entity::find_by_id(token.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(held.is_some_and(|r| !r.released))
    }

    async fn find(&self, key: &SlotKey) -> DomainResult<Option<TimeSlot>> {
        let model = time_slot::Entity::find_by_id(slot_id(key))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_day(
        &self,
        station_id: &str,
        charger_type: &str,
        date: NaiveDate,
    ) -> DomainResult<Vec<TimeSlot>> {
        let models = time_slot::Entity::find()
            .filter(time_slot::Column::StationId.eq(station_id))
            .filter(time_slot::Column::ChargerType.eq(charger_type))
            .filter(time_slot::Column::SlotDate.eq(date))
            .order_by_asc(time_slot::Column::SlotTime)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
