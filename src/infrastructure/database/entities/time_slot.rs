//! Time slot entity
//!
//! One row per materialized bucket of the slot grid.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "time_slots")]
pub struct Model {
    /// `station/charger_type/dateTHH:MM`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub station_id: String,
    pub charger_type: String,
    pub slot_date: Date,
    pub slot_time: Time,
    pub total_capacity: i32,
    pub reserved_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::slot_reservation::Entity")]
    SlotReservations,
}

impl Related<super::slot_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SlotReservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
