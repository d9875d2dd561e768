//! Database Models
//!
//! Row types for the listings the matcher reads and the match rows it writes.
//! Listings are created by the tenant/landlord flows elsewhere in the
//! marketplace; the matcher treats them as read-only.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::scoring::MatchDetails;

/// Listing status shared by both listing kinds; only active listings
/// participate in matching.
pub const STATUS_ACTIVE: &str = "active";

/// Tenant demand listing (QFP).
///
/// Every constraint field is optional: a missing bound means "no constraint"
/// and the corresponding component scores 100 (see scoring rules).
#[derive(Debug, Clone, FromRow)]
pub struct DemandListing {
    pub id: Uuid,

    /// Owning business; the business row carries the user id
    pub business_id: Uuid,

    /// Free text, compared trimmed and case-insensitively
    pub city: String,
    pub state: String,

    /// Required square footage range, either end open
    pub sqft_min: Option<i32>,
    pub sqft_max: Option<i32>,

    /// Monthly budget range, either end open
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,

    /// Required asset category (free text, e.g. "retail", "office_space")
    pub asset_type: Option<String>,

    /// Required features, matched against property amenities
    pub additional_features: Vec<String>,

    /// active | inactive
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Demand listing joined with its owning user (via the business row).
#[derive(Debug, Clone, FromRow)]
pub struct DemandListingWithOwner {
    #[sqlx(flatten)]
    pub listing: DemandListing,

    /// User who owns the business that posted this demand
    pub owner_user_id: Uuid,
}

/// Landlord/broker property listing.
#[derive(Debug, Clone, FromRow)]
pub struct PropertyListing {
    pub id: Uuid,
    pub title: String,

    pub city: String,
    pub state: String,

    pub sqft: i32,

    /// Asking price; listings without one still match with partial credit
    pub asking_price: Option<f64>,

    /// retail | office | industrial | warehouse | medical | flex | land | other
    pub property_type: String,

    pub amenities: Vec<String>,

    /// active | pending | leased | off_market
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted match row, unique per (demand, property) pair.
///
/// Re-scoring updates score, component scores, details and updated_at in
/// place. The lifecycle flags below belong to the user and survive
/// re-scoring; in particular a dismissed pair stays dismissed.
#[derive(Debug, Clone, FromRow)]
pub struct PropertyMatch {
    pub id: Uuid,
    pub demand_listing_id: Uuid,
    pub property_listing_id: Uuid,

    /// Weighted total, 0-100, two decimal places
    pub match_score: f64,

    pub location_score: f64,
    pub sqft_score: f64,
    pub price_score: f64,
    pub asset_type_score: f64,
    pub amenities_score: f64,

    /// Structured explanation of how each component was scored
    pub match_details: Json<MatchDetails>,

    pub is_viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub is_saved: bool,
    pub saved_at: Option<DateTime<Utc>>,
    pub is_dismissed: bool,
    pub dismissed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Match row joined with its property payload, the shape the dashboard
/// queries return.
#[derive(Debug, Clone, FromRow)]
pub struct MatchWithProperty {
    #[sqlx(flatten)]
    pub record: PropertyMatch,

    pub property_title: String,
    pub property_city: String,
    pub property_state: String,
    pub property_sqft: i32,
    pub property_asking_price: Option<f64>,
    pub property_type: String,
    pub property_status: String,
}
