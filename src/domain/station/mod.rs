//! Station catalog boundary
//!
//! Stations and their chargers are owned by the catalog service; the
//! booking core only reads capacity and the optional price hint.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::shared::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ChargerSpec {
    pub charger_type: String,
    /// Number of chargers of this type, i.e. bucket capacity
    pub slots: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    /// Up-front price of one booked bucket, if the station publishes one
    pub price_per_slot_npr: Option<Decimal>,
    pub chargers: Vec<ChargerSpec>,
}

impl Station {
    pub fn charger(&self, charger_type: &str) -> Option<&ChargerSpec> {
        self.chargers
            .iter()
            .find(|c| c.charger_type.eq_ignore_ascii_case(charger_type))
    }
}

#[async_trait]
pub trait StationCatalog: Send + Sync {
    async fn find_station(&self, station_id: &str) -> DomainResult<Option<Station>>;

    /// Resolve a charger type of a station to its catalog entry.
    ///
    /// Matching is case-insensitive; the returned spec carries the catalog's
    /// canonical spelling, which is what slot keys are built from.
    async fn resolve_charger(
        &self,
        station_id: &str,
        charger_type: &str,
    ) -> DomainResult<ChargerSpec> {
        let station = self
            .find_station(station_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Station",
                field: "id",
                value: station_id.to_string(),
            })?;

        station
            .charger(charger_type)
            .cloned()
            .ok_or_else(|| DomainError::NotFound {
                entity: "Charger",
                field: "charger_type",
                value: format!("{}@{}", charger_type, station_id),
            })
    }
}
