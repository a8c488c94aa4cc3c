//! Shared fixtures for service tests

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;

use super::{
    BookingService, CreateBooking, NotificationFeed, PaymentReconciler, SettlementService,
    SlotGrid,
};
use crate::domain::booking::{Booking, Urgency};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::slot::SlotGridSettings;
use crate::domain::station::{ChargerSpec, Station};
use crate::domain::Actor;
use crate::infrastructure::catalog::StaticStationCatalog;
use crate::infrastructure::gateway::SandboxGateway;
use crate::infrastructure::storage::InMemoryRepositoryProvider;
use crate::shared::time::FixedClock;

pub(crate) struct Fixture {
    pub clock: Arc<FixedClock>,
    pub repos: Arc<dyn RepositoryProvider>,
    pub gateway: Arc<SandboxGateway>,
    pub grid: Arc<SlotGrid>,
    pub bookings: Arc<BookingService>,
    pub settlement: Arc<SettlementService>,
    pub payments: Arc<PaymentReconciler>,
    pub feed: Arc<NotificationFeed>,
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Stations used across tests:
/// * `S1`: one Type2 charger, priced at NPR 5.00 per slot
/// * `S2`: two Type2 chargers, no up-front price
pub(crate) fn stations() -> Vec<Station> {
    vec![
        Station {
            id: "S1".into(),
            name: "Thamel".into(),
            price_per_slot_npr: Some(Decimal::new(500, 2)),
            chargers: vec![ChargerSpec {
                charger_type: "Type2".into(),
                slots: 1,
            }],
        },
        Station {
            id: "S2".into(),
            name: "Lalitpur".into(),
            price_per_slot_npr: None,
            chargers: vec![ChargerSpec {
                charger_type: "Type2".into(),
                slots: 2,
            }],
        },
    ]
}

/// Services wired over in-memory storage, a manual sandbox gateway and a
/// clock fixed at 2024-06-01 08:00 UTC.
pub(crate) fn fixture() -> Fixture {
    fixture_with_gateway(SandboxGateway::new("http://sandbox.local"))
}

pub(crate) fn fixture_with_gateway(gateway: SandboxGateway) -> Fixture {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ));
    let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
    let catalog = Arc::new(StaticStationCatalog::new(stations()));
    let gateway = Arc::new(gateway);

    let grid = Arc::new(SlotGrid::new(
        repos.clone(),
        catalog.clone(),
        SlotGridSettings::default(),
        clock.clone(),
    ));
    let bookings = Arc::new(BookingService::new(
        repos.clone(),
        grid.clone(),
        catalog,
        clock.clone(),
    ));
    let settlement = Arc::new(SettlementService::new(repos.clone(), clock.clone()));
    let payments = Arc::new(PaymentReconciler::new(
        repos.clone(),
        gateway.clone(),
        clock.clone(),
        StdDuration::from_millis(200),
    ));
    let feed = Arc::new(NotificationFeed::new(repos.clone(), clock.clone()));

    Fixture {
        clock,
        repos,
        gateway,
        grid,
        bookings,
        settlement,
        payments,
        feed,
    }
}

impl Fixture {
    pub async fn book(&self, user: &str, station: &str, d: NaiveDate, t: NaiveTime) -> Booking {
        self.bookings
            .create_booking(CreateBooking {
                user_id: user.into(),
                station_id: station.into(),
                charger_type: "Type2".into(),
                date: Some(d),
                time: Some(t),
                urgency: Urgency::Medium,
            })
            .await
            .unwrap()
    }

    /// Drive an unpriced booking to `completed`.
    pub async fn completed_booking(&self, user: &str) -> Booking {
        let b = self.book(user, "S2", date(2024, 6, 1), time(10, 0)).await;
        self.bookings
            .mark_charging_completed(&b.booking_id, &Actor::operator("op"), None)
            .await
            .unwrap()
    }

    pub async fn reload(&self, booking_id: &str) -> Booking {
        self.repos
            .bookings()
            .find_by_id(booking_id)
            .await
            .unwrap()
            .unwrap()
    }
}
