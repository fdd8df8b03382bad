//! Static locality dataset.
//!
//! Each entry is a suburb/locality with a pre-assigned region label. The
//! dataset ships as JSON and is held in memory for the process lifetime.
//! Known data quirks (stray rows with coordinates from the wrong state,
//! single-suburb phantom regions) are handled by the resolver, not here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single locality row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    pub postcode: String,
    pub state: String,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
}

/// A named hard boundary. Regions listed in `far_side` are dropped from
/// coverage when the barrier is named in an adjustment, unless the base
/// point itself sits on the far side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Barrier {
    pub name: String,
    pub state: String,
    pub far_side: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetFile {
    localities: Vec<Locality>,
    #[serde(default)]
    barriers: Vec<Barrier>,
}

/// The in-memory geographic dataset.
#[derive(Debug, Clone)]
pub struct GeoDataset {
    localities: Vec<Locality>,
    barriers: Vec<Barrier>,
}

impl GeoDataset {
    /// Load a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::DatasetLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|e| ConfigError::DatasetLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a dataset from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: DatasetFile = serde_json::from_str(raw)?;
        Ok(Self {
            localities: file.localities,
            barriers: file.barriers,
        })
    }

    /// The dataset bundled with the crate. Used as the default at startup
    /// and as the fixed snapshot in tests.
    pub fn bundled() -> Self {
        Self::from_json(include_str!("../../data/localities.json"))
            .expect("bundled locality dataset is valid JSON")
    }

    pub fn len(&self) -> usize {
        self.localities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.localities.is_empty()
    }

    pub fn localities(&self) -> &[Locality] {
        &self.localities
    }

    pub fn barriers(&self) -> &[Barrier] {
        &self.barriers
    }

    /// All localities matching a postcode.
    pub fn by_postcode(&self, postcode: &str) -> Vec<&Locality> {
        self.localities
            .iter()
            .filter(|l| l.postcode == postcode)
            .collect()
    }

    /// All localities whose name matches, case-insensitive.
    pub fn by_name(&self, name: &str) -> Vec<&Locality> {
        let needle = name.trim().to_lowercase();
        self.localities
            .iter()
            .filter(|l| l.name.to_lowercase() == needle)
            .collect()
    }

    /// Look up a barrier by name, case-insensitive.
    pub fn barrier(&self, name: &str) -> Option<&Barrier> {
        let needle = name.trim().to_lowercase();
        self.barriers
            .iter()
            .find(|b| b.name.to_lowercase() == needle)
    }

    /// All distinct region names in a state, sorted.
    pub fn regions_in_state(&self, state: &str) -> Vec<String> {
        let mut regions: Vec<String> = self
            .localities
            .iter()
            .filter(|l| l.state == state)
            .map(|l| l.region.clone())
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    /// All localities in a named region within a state.
    pub fn region_members(&self, state: &str, region: &str) -> Vec<&Locality> {
        self.localities
            .iter()
            .filter(|l| l.state == state && l.region == region)
            .collect()
    }
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_dataset_loads() {
        let dataset = GeoDataset::bundled();
        assert!(!dataset.is_empty());
        assert!(!dataset.barriers().is_empty());
    }

    #[test]
    fn postcode_lookup() {
        let dataset = GeoDataset::bundled();
        let hits = dataset.by_postcode("2095");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Manly");
        assert_eq!(hits[0].region, "Northern Beaches");
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let dataset = GeoDataset::bundled();
        assert_eq!(dataset.by_name("manly").len(), 1);
        assert_eq!(dataset.by_name("MANLY").len(), 1);
        assert!(dataset.by_name("nowhere").is_empty());
    }

    #[test]
    fn haversine_known_distance() {
        // Sydney CBD to Parramatta is roughly 19-20km
        let d = haversine_km(-33.8688, 151.2093, -33.8150, 151.0010);
        assert!(d > 18.0 && d < 21.0, "unexpected distance {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_km(-33.8688, 151.2093, -33.8688, 151.2093), 0.0);
    }

    #[test]
    fn regions_in_state_sorted_and_deduped() {
        let dataset = GeoDataset::bundled();
        let regions = dataset.regions_in_state("NSW");
        let mut sorted = regions.clone();
        sorted.sort();
        assert_eq!(regions, sorted);
        assert!(regions.contains(&"Northern Beaches".to_string()));
        // NT stray row must not contribute an NSW region
        assert!(!regions.contains(&"Red Centre".to_string()));
    }
}
