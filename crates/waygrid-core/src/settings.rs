//! Tunables consumed by the route search.

/// How strictly axle-load and bridge-weight limits are enforced.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightLimitPolicy {
    /// Limits are ignored entirely.
    Unenforced,
    /// Overweight ways stay routable but cost a heavy surcharge.
    #[default]
    ReportOnly,
    /// Overweight ways are never routed over.
    Strict,
    /// Up to 10% overweight is tolerated (with surcharge); beyond that the
    /// way is blocked.
    Tolerant,
}

impl WeightLimitPolicy {
    /// Decode the historical numeric setting (0..=3).
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Unenforced,
            1 => Self::ReportOnly,
            2 => Self::Strict,
            _ => Self::Tolerant,
        }
    }
}

/// World settings relevant to routing.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// Hard per-search node budget; exceeding it fails the search.
    pub max_route_steps: u32,
    pub weight_limit_policy: WeightLimitPolicy,
    pub meters_per_tile: u32,
    /// Background discovery yields to the scheduler after processing this
    /// many route tiles; zero disables pacing.
    pub discovery_tiles_per_slice: u32,
    /// Record discovery routes to plain city buildings (not only town
    /// halls, industries and attractions).
    pub record_city_building_routes: bool,
    /// Only record city attractions whose visitor demand exceeds this.
    pub attraction_demand_threshold: u16,
    /// Only record city industries whose visitor demand exceeds this.
    pub industry_demand_threshold: u16,
    /// If set, skip recording non-consumer industries further than this
    /// many road tiles beyond the origin city's edge.
    pub max_industry_commute_tiles: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_route_steps: 1_000_000,
            weight_limit_policy: WeightLimitPolicy::default(),
            meters_per_tile: 250,
            discovery_tiles_per_slice: 2048,
            record_city_building_routes: true,
            attraction_demand_threshold: 0,
            industry_demand_threshold: 0,
            max_industry_commute_tiles: None,
        }
    }
}
