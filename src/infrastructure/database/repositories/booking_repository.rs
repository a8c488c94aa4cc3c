//! SeaORM implementation of BookingRepository

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use uuid::Uuid;

use crate::domain::booking::{
    Booking, BookingRepository, BookingStatus, PaymentData, PaymentStatus, Urgency,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::booking;

use super::db_err;

pub struct SeaOrmBookingRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn list(&self, select: sea_orm::Select<booking::Entity>) -> DomainResult<Vec<Booking>> {
        select
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: booking::Model) -> DomainResult<Booking> {
    let payment_data = match (m.gateway_txn_id, m.payment_verified_at) {
        (Some(gateway_txn_id), Some(verified_at)) => Some(PaymentData {
            gateway_txn_id,
            verified_at,
        }),
        _ => None,
    };

    Ok(Booking {
        booking_id: m.booking_id,
        user_id: m.user_id,
        station_id: m.station_id,
        charger_type: m.charger_type,
        booking_date: m.booking_date,
        booking_time: m.booking_time,
        status: BookingStatus::from_str(&m.status)?,
        payment_status: PaymentStatus::from_str(&m.payment_status)?,
        amount_npr: m.amount_paisa.map(|p| Decimal::new(p, 2)),
        charging_completed: m.charging_completed,
        charging_completed_at: m.charging_completed_at,
        admin_amount_set: m.admin_amount_set,
        admin_set_amount_at: m.admin_set_amount_at,
        actual_duration_minutes: m.actual_duration_minutes.map(|d| d.max(0) as u32),
        settlement_notes: m.settlement_notes,
        payment_data,
        gateway_reference: m.gateway_reference,
        reservation_token: m
            .reservation_token
            .as_deref()
            .and_then(|t| Uuid::parse_str(t).ok()),
        review_flag: m.review_flag,
        auto_booked: m.auto_booked,
        urgency: Urgency::from_str(&m.urgency)?,
        created_at: m.created_at,
        updated_at: m.updated_at,
        version: m.version,
    })
}

/// Every column except the key, with `version` as given.
fn domain_to_active(b: &Booking, version: i32) -> booking::ActiveModel {
    booking::ActiveModel {
        booking_id: NotSet,
        user_id: Set(b.user_id.clone()),
        station_id: Set(b.station_id.clone()),
        charger_type: Set(b.charger_type.clone()),
        booking_date: Set(b.booking_date),
        booking_time: Set(b.booking_time),
        status: Set(b.status.as_str().to_string()),
        payment_status: Set(b.payment_status.as_str().to_string()),
        amount_paisa: Set(b.amount_paisa()),
        charging_completed: Set(b.charging_completed),
        charging_completed_at: Set(b.charging_completed_at),
        admin_amount_set: Set(b.admin_amount_set),
        admin_set_amount_at: Set(b.admin_set_amount_at),
        actual_duration_minutes: Set(b.actual_duration_minutes.map(|d| d as i32)),
        settlement_notes: Set(b.settlement_notes.clone()),
        gateway_txn_id: Set(b.payment_data.as_ref().map(|p| p.gateway_txn_id.clone())),
        payment_verified_at: Set(b.payment_data.as_ref().map(|p| p.verified_at)),
        gateway_reference: Set(b.gateway_reference.clone()),
        reservation_token: Set(b.reservation_token.map(|t| t.to_string())),
        review_flag: Set(b.review_flag.clone()),
        auto_booked: Set(b.auto_booked),
        urgency: Set(b.urgency.as_str().to_string()),
        created_at: Set(b.created_at),
        updated_at: Set(b.updated_at),
        version: Set(version),
    }
}

fn write_err(booking_id: &str, e: sea_orm::DbErr) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => DomainError::Conflict(format!(
            "booking {} violates a uniqueness constraint: {}",
            booking_id, detail
        )),
        _ => db_err(e),
    }
}

// ── BookingRepository impl ──────────────────────────────────────

#[async_trait]
impl BookingRepository for SeaOrmBookingRepository {
    async fn insert(&self, b: &Booking) -> DomainResult<()> {
        debug!("Saving booking: {}", b.booking_id);
        b.check_invariants()?;

        let mut model = domain_to_active(b, b.version);
        model.booking_id = Set(b.booking_id.clone());
        model
            .insert(&self.db)
            .await
            .map_err(|e| write_err(&b.booking_id, e))?;
        Ok(())
    }

    async fn update(&self, b: &Booking) -> DomainResult<Booking> {
        debug!("Updating booking: {} (version {})", b.booking_id, b.version);
        b.check_invariants()?;

        let result = booking::Entity::update_many()
            .set(domain_to_active(b, b.version + 1))
            .filter(booking::Column::BookingId.eq(b.booking_id.as_str()))
            .filter(booking::Column::Version.eq(b.version))
            .exec(&self.db)
            .await
            .map_err(|e| write_err(&b.booking_id, e))?;

        if result.rows_affected == 0 {
            return match self.find_by_id(&b.booking_id).await? {
                Some(current) => Err(DomainError::Conflict(format!(
                    "booking {} was modified concurrently (expected version {}, found {})",
                    b.booking_id, b.version, current.version
                ))),
                None => Err(DomainError::booking_not_found(&b.booking_id)),
            };
        }

        let mut stored = b.clone();
        stored.version += 1;
        Ok(stored)
    }

    async fn find_by_id(&self, booking_id: &str) -> DomainResult<Option<Booking>> {
        booking::Entity::find_by_id(booking_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_gateway_reference(&self, reference: &str) -> DomainResult<Option<Booking>> {
        booking::Entity::find()
            .filter(booking::Column::GatewayReference.eq(reference))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_gateway_txn_id(&self, txn_id: &str) -> DomainResult<Option<Booking>> {
        booking::Entity::find()
            .filter(booking::Column::GatewayTxnId.eq(txn_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        self.list(
            booking::Entity::find()
                .filter(booking::Column::UserId.eq(user_id))
                .order_by_desc(booking::Column::CreatedAt),
        )
        .await
    }

    async fn find_by_payment_status(
        &self,
        user_id: Option<&str>,
        status: PaymentStatus,
    ) -> DomainResult<Vec<Booking>> {
        let mut query =
            booking::Entity::find().filter(booking::Column::PaymentStatus.eq(status.as_str()));
        if let Some(user_id) = user_id {
            query = query.filter(booking::Column::UserId.eq(user_id));
        }
        self.list(query.order_by_desc(booking::Column::CreatedAt)).await
    }

    async fn find_awaiting_settlement(&self, station_id: Option<&str>) -> DomainResult<Vec<Booking>> {
        let mut query = booking::Entity::find()
            .filter(booking::Column::ChargingCompleted.eq(true))
            .filter(booking::Column::AdminAmountSet.eq(false))
            .filter(booking::Column::PaymentStatus.ne(PaymentStatus::Paid.as_str()));
        if let Some(station_id) = station_id {
            query = query.filter(booking::Column::StationId.eq(station_id));
        }
        self.list(query.order_by_asc(booking::Column::ChargingCompletedAt))
            .await
    }

    async fn find_paid_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        self.list(
            booking::Entity::find()
                .filter(booking::Column::PaymentStatus.eq(PaymentStatus::Paid.as_str()))
                .filter(booking::Column::PaymentVerifiedAt.between(from, to))
                .order_by_desc(booking::Column::PaymentVerifiedAt),
        )
        .await
    }

    async fn find_pending_payment_before(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Booking>> {
        self.list(
            booking::Entity::find()
                .filter(booking::Column::Status.eq(BookingStatus::PendingPayment.as_str()))
                .filter(booking::Column::CreatedAt.lt(cutoff))
                .order_by_asc(booking::Column::CreatedAt),
        )
        .await
    }

    async fn find_flagged(&self) -> DomainResult<Vec<Booking>> {
        self.list(
            booking::Entity::find()
                .filter(booking::Column::ReviewFlag.is_not_null())
                .order_by_desc(booking::Column::UpdatedAt),
        )
        .await
    }
}
