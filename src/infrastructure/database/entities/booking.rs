//! Booking entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub booking_id: String,

    pub user_id: String,
    pub station_id: String,
    pub charger_type: String,
    pub booking_date: Date,

    #[sea_orm(nullable)]
    pub booking_time: Option<Time>,

    /// pending_payment, confirmed, in_progress, completed, cancelled
    pub status: String,
    /// none, pending, paid, deferred, failed
    pub payment_status: String,

    /// Stored in paisa
    #[sea_orm(nullable)]
    pub amount_paisa: Option<i64>,

    pub charging_completed: bool,
    #[sea_orm(nullable)]
    pub charging_completed_at: Option<DateTimeUtc>,

    pub admin_amount_set: bool,
    #[sea_orm(nullable)]
    pub admin_set_amount_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub actual_duration_minutes: Option<i32>,
    #[sea_orm(nullable)]
    pub settlement_notes: Option<String>,

    #[sea_orm(unique, nullable)]
    pub gateway_txn_id: Option<String>,
    #[sea_orm(nullable)]
    pub payment_verified_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub gateway_reference: Option<String>,

    #[sea_orm(nullable)]
    pub reservation_token: Option<String>,
    #[sea_orm(nullable)]
    pub review_flag: Option<String>,

    pub auto_booked: bool,
    pub urgency: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
