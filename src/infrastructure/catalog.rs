//! Station catalog backed by the `[[stations]]` config section

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::StationConfig;
use crate::domain::station::{Station, StationCatalog};
use crate::domain::DomainResult;

pub struct StaticStationCatalog {
    stations: HashMap<String, Station>,
}

impl StaticStationCatalog {
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Self {
        Self {
            stations: stations.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn from_config(stations: &[StationConfig]) -> Self {
        Self::new(stations.iter().map(Station::from))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[async_trait]
impl StationCatalog for StaticStationCatalog {
    async fn find_station(&self, station_id: &str) -> DomainResult<Option<Station>> {
        Ok(self.stations.get(station_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::station::ChargerSpec;
    use crate::domain::DomainError;

    fn catalog() -> StaticStationCatalog {
        StaticStationCatalog::new([Station {
            id: "S1".into(),
            name: "Thamel".into(),
            price_per_slot_npr: None,
            chargers: vec![ChargerSpec {
                charger_type: "Type2".into(),
                slots: 2,
            }],
        }])
    }

    #[tokio::test]
    async fn resolves_charger_case_insensitively() {
        let spec = catalog().resolve_charger("S1", "type2").await.unwrap();
        assert_eq!(spec.charger_type, "Type2");
        assert_eq!(spec.slots, 2);
    }

    #[tokio::test]
    async fn unknown_station_or_charger_is_not_found() {
        let c = catalog();
        assert!(matches!(
            c.resolve_charger("S9", "Type2").await,
            Err(DomainError::NotFound { entity: "Station", .. })
        ));
        assert!(matches!(
            c.resolve_charger("S1", "CCS").await,
            Err(DomainError::NotFound { entity: "Charger", .. })
        ));
    }
}
