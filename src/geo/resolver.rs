//! Deterministic coverage resolution.
//!
//! Maps a base point + radius + qualitative adjustments to a concrete
//! `CoverageArea`. For fixed inputs and a fixed dataset snapshot the output
//! is bit-identical: groups are sorted by size then name, members by
//! distance then name, and no clock or randomness is consulted.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::GeoError;

use super::dataset::{GeoDataset, Locality, haversine_km};

/// The resolved base location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePoint {
    pub suburb: String,
    pub postcode: String,
    pub state: String,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
}

/// A locality retained within a coverage area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveredLocality {
    pub name: String,
    pub postcode: String,
    pub distance_km: f64,
}

/// A named region group within a coverage area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionGroup {
    pub name: String,
    pub localities: Vec<CoveredLocality>,
}

/// Qualitative adjustments to resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    /// Named hard boundaries; regions on the far side are dropped.
    #[serde(default)]
    pub barriers: Vec<String>,
    /// High-demand regions included even beyond the radius.
    #[serde(default)]
    pub boost_regions: Vec<String>,
    /// Explicit user exclusions. These persist across recomputation.
    #[serde(default)]
    pub exclude_regions: Vec<String>,
    /// Cover every region in the base point's jurisdiction.
    #[serde(default)]
    pub everywhere: bool,
    /// Free-text note on coverage shape, carried through verbatim.
    #[serde(default)]
    pub travel_notes: String,
}

/// The resolved coverage area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageArea {
    pub base: BasePoint,
    pub radius_km: f64,
    pub regions_included: Vec<RegionGroup>,
    pub regions_excluded: Vec<String>,
    pub travel_notes: String,
}

impl CoverageArea {
    /// Names of included regions, in output order.
    pub fn included_names(&self) -> Vec<&str> {
        self.regions_included
            .iter()
            .map(|g| g.name.as_str())
            .collect()
    }
}

/// Deterministic geo resolver over a fixed dataset snapshot.
pub struct GeoResolver {
    dataset: Arc<GeoDataset>,
    min_region_members: usize,
    default_radius_km: f64,
}

impl GeoResolver {
    pub fn new(dataset: Arc<GeoDataset>, config: &EngineConfig) -> Self {
        Self {
            dataset,
            min_region_members: config.min_region_members,
            default_radius_km: config.default_radius_km,
        }
    }

    pub fn default_radius_km(&self) -> f64 {
        self.default_radius_km
    }

    pub fn dataset(&self) -> &GeoDataset {
        &self.dataset
    }

    /// Resolve free-form base input (a 4-digit postcode or a locality name)
    /// to a known point. Unknown input is an input error, not a system
    /// failure.
    pub fn resolve_base(&self, input: &str) -> Result<BasePoint, GeoError> {
        let trimmed = input.trim();
        let matches = if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            self.dataset.by_postcode(trimmed)
        } else {
            self.dataset.by_name(trimmed)
        };

        let locality = matches.first().ok_or_else(|| GeoError::UnknownLocation {
            input: trimmed.to_string(),
        })?;

        if locality.lat == 0.0 || locality.lng == 0.0 {
            return Err(GeoError::MissingCoordinates {
                name: locality.name.clone(),
            });
        }

        Ok(BasePoint {
            suburb: locality.name.clone(),
            postcode: locality.postcode.clone(),
            state: locality.state.clone(),
            region: locality.region.clone(),
            lat: locality.lat,
            lng: locality.lng,
        })
    }

    /// Resolve a coverage area from a base point, radius, and adjustments.
    pub fn resolve(
        &self,
        base: &BasePoint,
        radius_km: Option<f64>,
        adjustments: &Adjustments,
    ) -> CoverageArea {
        let radius_km = radius_km.unwrap_or(self.default_radius_km);

        let mut groups: BTreeMap<String, Vec<CoveredLocality>> = BTreeMap::new();
        let mut excluded: Vec<String> = Vec::new();

        if adjustments.everywhere {
            // Union of all regions in the base point's jurisdiction,
            // regardless of radius. The sparse-group guard still applies.
            for region in self.dataset.regions_in_state(&base.state) {
                let members = self.dataset.region_members(&base.state, &region);
                if members.len() < self.min_region_members {
                    continue;
                }
                groups.insert(region, covered(&members, base));
            }
        } else {
            // Radius retention, grouped by region label.
            let mut retained: BTreeMap<String, Vec<(&Locality, f64)>> = BTreeMap::new();
            for locality in self.dataset.localities() {
                if locality.lat == 0.0 || locality.lng == 0.0 {
                    continue;
                }
                let distance = haversine_km(base.lat, base.lng, locality.lat, locality.lng);
                if distance <= radius_km {
                    retained
                        .entry(locality.region.clone())
                        .or_default()
                        .push((locality, distance));
                }
            }

            for (region, members) in retained {
                // Sparse groups are stray dataset rows, not real regions.
                if members.len() < self.min_region_members {
                    tracing::debug!(region = %region, count = members.len(), "Discarding sparse region group");
                    continue;
                }
                // Cross-border contamination guard: the group's dominant
                // state must match the base point's state.
                if dominant_state(&members) != base.state {
                    tracing::debug!(region = %region, "Discarding cross-border region group");
                    continue;
                }
                let covered = members
                    .into_iter()
                    .map(|(l, d)| CoveredLocality {
                        name: l.name.clone(),
                        postcode: l.postcode.clone(),
                        distance_km: round1(d),
                    })
                    .collect();
                groups.insert(region, covered);
            }

            // High-demand inclusions beyond the radius. Unknown names are a
            // no-op.
            for boost in &adjustments.boost_regions {
                let name = boost.trim();
                if name.is_empty() || groups.contains_key(name) {
                    continue;
                }
                let members = self.dataset.region_members(&base.state, name);
                if members.len() < self.min_region_members {
                    continue;
                }
                groups.insert(name.to_string(), covered(&members, base));
            }

            // Barriers drop far-side regions, unless the base point itself
            // sits on the far side. Unknown barrier names are a no-op.
            for barrier_name in &adjustments.barriers {
                let Some(barrier) = self.dataset.barrier(barrier_name) else {
                    continue;
                };
                if barrier.state != base.state {
                    continue;
                }
                if barrier.far_side.iter().any(|r| *r == base.region) {
                    continue;
                }
                for region in &barrier.far_side {
                    if groups.remove(region).is_some() {
                        excluded.push(region.clone());
                    }
                }
            }
        }

        // Explicit user exclusions always apply, and are recorded even when
        // the region wasn't currently included (they must survive later
        // recomputations).
        for exclusion in &adjustments.exclude_regions {
            let name = exclusion.trim();
            if name.is_empty() {
                continue;
            }
            groups.remove(name);
            excluded.push(name.to_string());
        }

        excluded.sort();
        excluded.dedup();

        // Largest groups first, name as tie-break; members by distance then
        // name. Stable for fixed inputs.
        let mut regions_included: Vec<RegionGroup> = groups
            .into_iter()
            .map(|(name, mut localities)| {
                localities.sort_by(|a, b| {
                    a.distance_km
                        .partial_cmp(&b.distance_km)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.name.cmp(&b.name))
                });
                RegionGroup { name, localities }
            })
            .collect();
        regions_included.sort_by(|a, b| {
            b.localities
                .len()
                .cmp(&a.localities.len())
                .then_with(|| a.name.cmp(&b.name))
        });

        CoverageArea {
            base: base.clone(),
            radius_km,
            regions_included,
            regions_excluded: excluded,
            travel_notes: adjustments.travel_notes.clone(),
        }
    }
}

fn covered(members: &[&Locality], base: &BasePoint) -> Vec<CoveredLocality> {
    members
        .iter()
        .map(|l| CoveredLocality {
            name: l.name.clone(),
            postcode: l.postcode.clone(),
            distance_km: round1(haversine_km(base.lat, base.lng, l.lat, l.lng)),
        })
        .collect()
}

fn dominant_state(members: &[(&Locality, f64)]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (locality, _) in members {
        *counts.entry(locality.state.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(state, _)| state.to_string())
        .unwrap_or_default()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> GeoResolver {
        GeoResolver::new(Arc::new(GeoDataset::bundled()), &EngineConfig::default())
    }

    #[test]
    fn resolve_base_by_postcode_and_name() {
        let r = resolver();
        let by_postcode = r.resolve_base("2095").unwrap();
        assert_eq!(by_postcode.suburb, "Manly");
        let by_name = r.resolve_base("manly").unwrap();
        assert_eq!(by_name.postcode, "2095");
        assert_eq!(by_name.state, "NSW");
    }

    #[test]
    fn resolve_base_unknown_is_input_error() {
        let r = resolver();
        let err = r.resolve_base("Atlantis").unwrap_err();
        assert!(matches!(err, GeoError::UnknownLocation { .. }));
    }

    #[test]
    fn radius_resolution_includes_dense_same_state_regions() {
        let r = resolver();
        let base = r.resolve_base("2095").unwrap();
        let area = r.resolve(&base, Some(20.0), &Adjustments::default());

        let names = area.included_names();
        assert!(names.contains(&"Northern Beaches"));
        assert!(names.contains(&"North Shore"));
        assert!(area.regions_excluded.is_empty());
        // Central Coast is well beyond 20km of Manly
        assert!(!names.contains(&"Central Coast"));
    }

    #[test]
    fn sparse_region_groups_are_discarded() {
        let r = resolver();
        let base = r.resolve_base("2000").unwrap();
        let area = r.resolve(&base, Some(20.0), &Adjustments::default());
        // Harbour Islands has a single member near the CBD
        assert!(!area.included_names().contains(&"Harbour Islands"));
    }

    #[test]
    fn cross_border_groups_are_discarded() {
        let r = resolver();
        let base = r.resolve_base("2000").unwrap();
        let area = r.resolve(&base, Some(20.0), &Adjustments::default());
        // The stray NT row carries Sydney coordinates but must not surface
        assert!(!area.included_names().contains(&"Red Centre"));
    }

    #[test]
    fn everywhere_override_covers_full_jurisdiction() {
        let r = resolver();
        let base = r.resolve_base("2095").unwrap();
        let adjustments = Adjustments {
            everywhere: true,
            ..Default::default()
        };
        let area = r.resolve(&base, Some(1.0), &adjustments);
        let names = area.included_names();
        assert!(names.contains(&"Central Coast"));
        assert!(names.contains(&"Western Sydney"));
        assert!(names.contains(&"Sutherland Shire"));
        // No VIC regions in an NSW jurisdiction
        assert!(!names.contains(&"Melbourne City"));
    }

    #[test]
    fn barrier_removes_far_side_regions() {
        let r = resolver();
        let base = r.resolve_base("2000").unwrap();
        let adjustments = Adjustments {
            barriers: vec!["Sydney Harbour".to_string()],
            ..Default::default()
        };
        let area = r.resolve(&base, Some(20.0), &adjustments);
        assert!(!area.included_names().contains(&"North Shore"));
        assert!(area.regions_excluded.contains(&"North Shore".to_string()));
    }

    #[test]
    fn barrier_is_noop_when_base_is_on_far_side() {
        let r = resolver();
        let base = r.resolve_base("2095").unwrap();
        let adjustments = Adjustments {
            barriers: vec!["Sydney Harbour".to_string()],
            ..Default::default()
        };
        let area = r.resolve(&base, Some(20.0), &adjustments);
        assert!(area.included_names().contains(&"Northern Beaches"));
    }

    #[test]
    fn unknown_barrier_is_noop() {
        let r = resolver();
        let base = r.resolve_base("2000").unwrap();
        let with_unknown = Adjustments {
            barriers: vec!["Great Wall".to_string()],
            ..Default::default()
        };
        let plain = r.resolve(&base, Some(20.0), &Adjustments::default());
        let adjusted = r.resolve(&base, Some(20.0), &with_unknown);
        assert_eq!(plain, adjusted);
    }

    #[test]
    fn explicit_exclusions_apply_and_are_recorded() {
        let r = resolver();
        let base = r.resolve_base("2095").unwrap();
        let adjustments = Adjustments {
            exclude_regions: vec!["North Shore".to_string()],
            ..Default::default()
        };
        let area = r.resolve(&base, Some(20.0), &adjustments);
        assert!(!area.included_names().contains(&"North Shore"));
        assert!(area.regions_excluded.contains(&"North Shore".to_string()));
    }

    #[test]
    fn boost_region_included_beyond_radius() {
        let r = resolver();
        let base = r.resolve_base("2095").unwrap();
        let adjustments = Adjustments {
            boost_regions: vec!["Central Coast".to_string()],
            ..Default::default()
        };
        let area = r.resolve(&base, Some(20.0), &adjustments);
        assert!(area.included_names().contains(&"Central Coast"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let r = resolver();
        let base = r.resolve_base("2095").unwrap();
        let adjustments = Adjustments {
            barriers: vec!["Georges River".to_string()],
            exclude_regions: vec!["Sydney City".to_string()],
            ..Default::default()
        };
        let a = r.resolve(&base, Some(20.0), &adjustments);
        let b = r.resolve(&base, Some(20.0), &adjustments);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn groups_sorted_largest_first() {
        let r = resolver();
        let base = r.resolve_base("2000").unwrap();
        let area = r.resolve(&base, Some(20.0), &Adjustments::default());
        for pair in area.regions_included.windows(2) {
            assert!(pair[0].localities.len() >= pair[1].localities.len());
        }
        for group in &area.regions_included {
            for pair in group.localities.windows(2) {
                assert!(pair[0].distance_km <= pair[1].distance_km);
            }
        }
    }
}
