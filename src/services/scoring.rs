//! Match Scoring
//!
//! Pure, deterministic scoring of a property listing against a demand
//! listing. No I/O: the persistence and lifecycle around these scores live
//! in [`crate::services::matching`].
//!
//! # Scoring Model
//!
//! Five components, each 0-100, combined as a weighted average:
//!
//! ```text
//! component    weight   rule
//! ─────────────────────────────────────────────────────────────
//! location       30     city+state 100 / state only 50 / else 0
//! sqft           25     in range 100, 20% tolerance 70, 50% tolerance 40
//! price          25     in budget 100, 10% over 80, 25% over 50
//! asset_type     15     exact 100, compatibility table 70
//! amenities       5     matched required features ratio
//! ─────────────────────────────────────────────────────────────
//! total         100     Σ(weight × component) / 100, 2 decimals
//! ```
//!
//! A missing constraint on the demand side (no sqft range, no budget, no
//! asset type, no required features) scores its component 100: the tenant
//! did not ask, so every property satisfies it.

use serde::{Deserialize, Serialize};

use crate::db::models::{DemandListing, PropertyListing};

/// Component weights. Must sum to 100.
pub const LOCATION_WEIGHT: f64 = 30.0;
pub const SQFT_WEIGHT: f64 = 25.0;
pub const PRICE_WEIGHT: f64 = 25.0;
pub const ASSET_TYPE_WEIGHT: f64 = 15.0;
pub const AMENITIES_WEIGHT: f64 = 5.0;

/// Unrounded per-component scores, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub location: f64,
    pub sqft: f64,
    pub price: f64,
    pub asset_type: f64,
    pub amenities: f64,
}

/// Raw comparison facts behind each component score, persisted as JSONB for
/// display and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetails {
    pub location: LocationDetail,
    pub sqft: SqftDetail,
    pub price: PriceDetail,
    pub asset_type: AssetTypeDetail,
    pub amenities: AmenitiesDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetail {
    pub demand_city: String,
    pub demand_state: String,
    pub property_city: String,
    pub property_state: String,
    pub city_match: bool,
    pub state_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqftDetail {
    pub property_sqft: i32,
    pub required_min: Option<i32>,
    pub required_max: Option<i32>,
    /// True only when the property falls inside the requested range (or no
    /// range was requested); the tolerance bands report false.
    pub in_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDetail {
    pub asking_price: Option<f64>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub in_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTypeDetail {
    pub demand_type: Option<String>,
    pub property_type: String,
    pub exact_match: bool,
    pub compatible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmenitiesDetail {
    /// Required features that a property amenity satisfied
    pub matched_features: Vec<String>,
    pub total_required: u32,
    pub matched_count: u32,
}

/// Full scoring result for one (demand, property) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Weighted total in [0, 100], rounded to two decimals
    pub score: f64,
    pub component_scores: ComponentScores,
    pub details: MatchDetails,
}

/// Score a property against a demand listing.
///
/// Pure function: identical inputs always produce an identical breakdown.
pub fn calculate_match_score(
    demand: &DemandListing,
    property: &PropertyListing,
) -> ScoreBreakdown {
    let (location, location_detail) = score_location(demand, property);
    let (sqft, sqft_detail) = score_sqft(demand, property);
    let (price, price_detail) = score_price(demand, property);
    let (asset_type, asset_type_detail) = score_asset_type(demand, property);
    let (amenities, amenities_detail) = score_amenities(demand, property);

    let weighted = LOCATION_WEIGHT * location
        + SQFT_WEIGHT * sqft
        + PRICE_WEIGHT * price
        + ASSET_TYPE_WEIGHT * asset_type
        + AMENITIES_WEIGHT * amenities;

    ScoreBreakdown {
        score: round2(weighted / 100.0),
        component_scores: ComponentScores {
            location,
            sqft,
            price,
            asset_type,
            amenities,
        },
        details: MatchDetails {
            location: location_detail,
            sqft: sqft_detail,
            price: price_detail,
            asset_type: asset_type_detail,
            amenities: amenities_detail,
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Location: case-insensitive, trimmed equality on city and state.
///
/// An empty city or state never matches, even against another empty string;
/// listings without location data must not cluster together.
fn score_location(demand: &DemandListing, property: &PropertyListing) -> (f64, LocationDetail) {
    let demand_city = normalize_place(&demand.city);
    let demand_state = normalize_place(&demand.state);
    let property_city = normalize_place(&property.city);
    let property_state = normalize_place(&property.state);

    let city_match =
        !demand_city.is_empty() && !property_city.is_empty() && demand_city == property_city;
    let state_match =
        !demand_state.is_empty() && !property_state.is_empty() && demand_state == property_state;

    let score = if city_match && state_match {
        100.0
    } else if state_match {
        50.0
    } else {
        0.0
    };

    (
        score,
        LocationDetail {
            demand_city: demand.city.clone(),
            demand_state: demand.state.clone(),
            property_city: property.city.clone(),
            property_state: property.state.clone(),
            city_match,
            state_match,
        },
    )
}

fn normalize_place(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Square footage: 100 inside the requested range, then graduated credit for
/// near misses relative to the range size (≤20% off → 70, ≤50% off → 40).
fn score_sqft(demand: &DemandListing, property: &PropertyListing) -> (f64, SqftDetail) {
    let detail = |in_range| SqftDetail {
        property_sqft: property.sqft,
        required_min: demand.sqft_min,
        required_max: demand.sqft_max,
        in_range,
    };

    if demand.sqft_min.is_none() && demand.sqft_max.is_none() {
        return (100.0, detail(true));
    }

    let sqft = property.sqft as f64;
    let min = demand.sqft_min.map(f64::from).unwrap_or(0.0);

    let in_range = sqft >= min && demand.sqft_max.map_or(true, |max| sqft <= f64::from(max));
    if in_range {
        return (100.0, detail(true));
    }

    // At least one bound is set, so the fallback chain bottoms out before
    // reaching the property's own sqft.
    let range_end = demand
        .sqft_max
        .or(demand.sqft_min)
        .map(f64::from)
        .unwrap_or(sqft);
    let range_size = range_end - min;

    let diff = if sqft < min {
        min - sqft
    } else {
        // Out of range and not below min: above the configured max
        sqft - demand.sqft_max.map(f64::from).unwrap_or(range_end)
    };

    let score = if diff <= 0.2 * range_size {
        70.0
    } else if diff <= 0.5 * range_size {
        40.0
    } else {
        0.0
    };

    (score, detail(false))
}

/// Price: cheaper than asked always matches; over budget gets graduated
/// credit (≤10% over → 80, ≤25% over → 50); a listing without an asking
/// price scores 50 as partial credit.
fn score_price(demand: &DemandListing, property: &PropertyListing) -> (f64, PriceDetail) {
    let detail = |in_range| PriceDetail {
        asking_price: property.asking_price,
        budget_min: demand.budget_min,
        budget_max: demand.budget_max,
        in_range,
    };

    let Some(price) = property.asking_price else {
        return (50.0, detail(false));
    };

    if demand.budget_min.is_none() && demand.budget_max.is_none() {
        return (100.0, detail(true));
    }

    let within_max = demand.budget_max.map_or(true, |max| price <= max);
    if within_max {
        // Covers both the in-budget case and anything below the minimum:
        // cheaper than asked is still a match.
        return (100.0, detail(true));
    }

    let midpoint = demand.budget_max.or(demand.budget_min).unwrap_or(price);
    let diff = price - midpoint;

    let score = if diff <= 0.10 * midpoint {
        80.0
    } else if diff <= 0.25 * midpoint {
        50.0
    } else {
        0.0
    };

    (score, detail(false))
}

/// Asset type: exact case-insensitive equality scores 100; otherwise a fixed
/// bidirectional compatibility table scores 70.
fn score_asset_type(demand: &DemandListing, property: &PropertyListing) -> (f64, AssetTypeDetail) {
    let property_type = property.property_type.trim().to_lowercase();

    let required = demand
        .asset_type
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());

    let detail = |exact_match, compatible| AssetTypeDetail {
        demand_type: demand.asset_type.clone(),
        property_type: property.property_type.clone(),
        exact_match,
        compatible,
    };

    let Some(required) = required else {
        // No required type: vacuously an exact match
        return (100.0, detail(true, true));
    };

    if required == property_type {
        return (100.0, detail(true, true));
    }

    let compatible = compatible_asset_types(&property_type).contains(&required.as_str())
        || compatible_asset_types(&required).contains(&property_type.as_str());

    if compatible {
        (70.0, detail(false, true))
    } else {
        (0.0, detail(false, false))
    }
}

/// Demand asset types each property type is considered compatible with.
/// Checked in both directions by [`score_asset_type`].
fn compatible_asset_types(property_type: &str) -> &'static [&'static str] {
    match property_type {
        "retail" => &["retail", "storefront"],
        "office" => &["office_space", "office"],
        "industrial" => &["industrial_space", "warehouse"],
        "warehouse" => &["warehouse", "industrial_space"],
        "medical" => &["medical_office", "office_space"],
        "flex" => &["flex", "warehouse", "office_space"],
        "land" => &["land"],
        "other" => &["other"],
        _ => &[],
    }
}

/// Amenities: each required feature counts as matched when some property
/// amenity contains it (or it contains the amenity) after normalization.
fn score_amenities(demand: &DemandListing, property: &PropertyListing) -> (f64, AmenitiesDetail) {
    let required = &demand.additional_features;

    if required.is_empty() {
        return (
            100.0,
            AmenitiesDetail {
                matched_features: Vec::new(),
                total_required: 0,
                matched_count: 0,
            },
        );
    }

    let normalized_amenities: Vec<String> = property
        .amenities
        .iter()
        .map(|amenity| normalize_feature(amenity))
        .collect();

    let mut matched_features = Vec::new();
    for feature in required {
        let normalized = normalize_feature(feature);
        let matched = normalized_amenities
            .iter()
            .any(|amenity| amenity.contains(&normalized) || normalized.contains(amenity));
        if matched {
            matched_features.push(feature.clone());
        }
    }

    let matched_count = matched_features.len() as u32;
    let total_required = required.len() as u32;
    let score = (100.0 * f64::from(matched_count) / f64::from(total_required)).round();

    (
        score,
        AmenitiesDetail {
            matched_features,
            total_required,
            matched_count,
        },
    )
}

/// Lowercase and collapse everything non-alphanumeric to underscores, so
/// "Parking Lot" and "parking" compare as "parking_lot" / "parking".
fn normalize_feature(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
