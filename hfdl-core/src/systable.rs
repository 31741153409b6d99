//! Ground-station directory (system table), §3 and §11.2.
//!
//! Immutable-after-load mapping `gs_id (0..127) -> station record`, updated
//! wholesale when a newer system-table version arrives (HFNPDU type `0xD0`)
//! or loaded from a JSON file at startup. Validation mirrors the original
//! implementation's explicit per-field error taxonomy rather than a single
//! generic "bad config" error, since each failure mode is independently
//! actionable for an operator inspecting a hand-edited system table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

pub const GS_ID_MAX: u32 = 127;
pub const SYSTABLE_VERSION_MAX: u32 = 4095;

#[derive(Debug, Error)]
pub enum SystemTableError {
    #[error("system table is missing a 'version' field")]
    VersionMissing,

    #[error("system table version {version} out of range 0..={SYSTABLE_VERSION_MAX}")]
    VersionOutOfRange { version: u32 },

    #[error("system table is missing a 'stations' field")]
    StationsMissing,

    #[error("'stations' field is not an array")]
    StationWrongType,

    #[error("station entry is missing an 'id' field")]
    StationIdMissing,

    #[error("station id {id} out of range 0..={GS_ID_MAX}")]
    StationIdOutOfRange { id: u32 },

    #[error("duplicate station id {id}")]
    StationIdDuplicate { id: u32 },

    #[error("station 'name' field is not a string")]
    StationNameWrongType,

    #[error("station {id} is missing a 'frequencies' field")]
    FrequenciesMissing { id: u32 },

    #[error("station {id} 'frequencies' entry is not numeric")]
    FrequencyWrongType { id: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundStation {
    pub id: u8,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub frequencies_khz: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGroundStation {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub frequencies: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSystemTable {
    pub version: Option<i64>,
    pub stations: Option<Vec<RawGroundStation>>,
}

fn validate_and_convert(raw: RawSystemTable) -> Result<(u32, Vec<GroundStation>), SystemTableError> {
    let version = raw.version.ok_or(SystemTableError::VersionMissing)? as i128;
    if !(0..=SYSTABLE_VERSION_MAX as i128).contains(&version) {
        return Err(SystemTableError::VersionOutOfRange {
            version: version.clamp(0, u32::MAX as i128) as u32,
        });
    }
    let raw_stations = raw.stations.ok_or(SystemTableError::StationsMissing)?;

    let mut seen = std::collections::HashSet::new();
    let mut stations = Vec::with_capacity(raw_stations.len());
    for s in raw_stations {
        let id = s.id.ok_or(SystemTableError::StationIdMissing)?;
        if !(0..=GS_ID_MAX as i64).contains(&id) {
            return Err(SystemTableError::StationIdOutOfRange { id: id as u32 });
        }
        let id = id as u32;
        if !seen.insert(id) {
            return Err(SystemTableError::StationIdDuplicate { id });
        }
        let name = s.name.ok_or(SystemTableError::StationNameWrongType)?;
        let freqs_raw = s
            .frequencies
            .ok_or(SystemTableError::FrequenciesMissing { id })?;
        let mut frequencies_khz = Vec::with_capacity(freqs_raw.len());
        for f in freqs_raw {
            let n = f
                .as_u64()
                .ok_or(SystemTableError::FrequencyWrongType { id })?;
            frequencies_khz.push(n as u32);
        }
        stations.push(GroundStation {
            id: id as u8,
            name,
            lat: s.lat.unwrap_or(0.0),
            lon: s.lon.unwrap_or(0.0),
            frequencies_khz,
        });
    }

    Ok((version as u32, stations))
}

/// Mutex-guarded ground-station directory, readers-many / writers-rare.
#[derive(Debug, Default)]
pub struct SystemTable {
    inner: Mutex<SystemTableInner>,
}

#[derive(Debug, Default)]
struct SystemTableInner {
    version: u32,
    stations: HashMap<u8, GroundStation>,
}

impl SystemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_json(&self, json: &str) -> Result<(), SystemTableError> {
        let raw: RawSystemTable =
            serde_json::from_str(json).map_err(|_| SystemTableError::StationsMissing)?;
        self.load_raw(raw)
    }

    pub fn load_raw(&self, raw: RawSystemTable) -> Result<(), SystemTableError> {
        let (version, stations) = validate_and_convert(raw)?;
        let mut guard = self.inner.lock().unwrap();
        guard.version = version;
        guard.stations = stations.into_iter().map(|s| (s.id, s)).collect();
        Ok(())
    }

    /// Merge `stations` into the directory unless `version` is strictly
    /// older than the currently loaded one (system-table broadcast update
    /// path, §4.4 SPDU/HFNPDU). A broadcast is split across several HFNPDUs
    /// sharing one `systable_version` (distinguished by `seq_num`/`total_cnt`,
    /// §11.2 scenario S5); accepting same-version updates, not just strictly
    /// newer ones, lets each segment's entries merge into the one directory
    /// instead of only the first-seen segment surviving.
    pub fn update_if_newer(&self, version: u32, stations: Vec<GroundStation>) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if version < guard.version {
            return false;
        }
        guard.version = version;
        for s in stations {
            guard.stations.insert(s.id, s);
        }
        true
    }

    pub fn version(&self) -> u32 {
        self.inner.lock().unwrap().version
    }

    pub fn lookup(&self, gs_id: u8) -> Option<GroundStation> {
        self.inner.lock().unwrap().stations.get(&gs_id).cloned()
    }

    pub fn station_count(&self) -> usize {
        self.inner.lock().unwrap().stations.len()
    }

    /// First station whose frequency list contains `freq_khz`, used to
    /// label an uplink burst's originating ground station (§6 `station`
    /// output field) when the MPDU header itself carries no GS id.
    pub fn station_for_frequency(&self, freq_khz: u32) -> Option<GroundStation> {
        self.inner
            .lock()
            .unwrap()
            .stations
            .values()
            .find(|s| s.frequencies_khz.contains(&freq_khz))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{"version": 1, "stations": [
            {"id": 1, "name": "San Francisco", "lat": 37.5, "lon": -122.5, "frequencies": [5451, 10081]}
        ]}"#
    }

    #[test]
    fn loads_valid_table() {
        let table = SystemTable::new();
        table.load_json(sample_json()).unwrap();
        assert_eq!(table.version(), 1);
        assert_eq!(table.station_count(), 1);
        assert_eq!(table.lookup(1).unwrap().name, "San Francisco");
    }

    #[test]
    fn missing_version_is_rejected() {
        let raw: RawSystemTable = serde_json::from_str(r#"{"stations": []}"#).unwrap();
        assert!(matches!(
            validate_and_convert(raw),
            Err(SystemTableError::VersionMissing)
        ));
    }

    #[test]
    fn duplicate_station_id_is_rejected() {
        let raw: RawSystemTable = serde_json::from_str(
            r#"{"version": 1, "stations": [
                {"id": 1, "name": "A", "frequencies": [100]},
                {"id": 1, "name": "B", "frequencies": [200]}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            validate_and_convert(raw),
            Err(SystemTableError::StationIdDuplicate { id: 1 })
        ));
    }

    #[test]
    fn older_version_update_is_ignored() {
        let table = SystemTable::new();
        table.load_json(sample_json()).unwrap();
        let updated = table.update_if_newer(
            0,
            vec![GroundStation {
                id: 2,
                name: "Ignored".into(),
                lat: 0.0,
                lon: 0.0,
                frequencies_khz: vec![],
            }],
        );
        assert!(!updated);
        assert_eq!(table.station_count(), 1);
    }

    #[test]
    fn same_version_segments_merge_instead_of_being_ignored() {
        let table = SystemTable::new();
        let segment_one = vec![GroundStation {
            id: 10,
            name: "Segment One".into(),
            lat: 0.0,
            lon: 0.0,
            frequencies_khz: vec![5451],
        }];
        let segment_two = vec![GroundStation {
            id: 20,
            name: "Segment Two".into(),
            lat: 0.0,
            lon: 0.0,
            frequencies_khz: vec![10_081],
        }];
        assert!(table.update_if_newer(7, segment_one));
        assert!(table.update_if_newer(7, segment_two));
        assert_eq!(table.version(), 7);
        assert_eq!(table.station_count(), 2);
        assert!(table.lookup(10).is_some());
        assert!(table.lookup(20).is_some());
    }

    #[test]
    fn station_for_frequency_finds_owning_station() {
        let table = SystemTable::new();
        table.load_json(sample_json()).unwrap();
        assert_eq!(table.station_for_frequency(10_081).unwrap().name, "San Francisco");
        assert!(table.station_for_frequency(9_999).is_none());
    }
}
