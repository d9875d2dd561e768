//! Match Store Interface
//!
//! Trait boundary between the matching service and persistence. The
//! PostgreSQL implementation lives on [`crate::db::Database`]; tests run
//! against the in-memory mock below.
//!
//! All methods return `anyhow::Result`: the matcher propagates store
//! failures unchanged and adds no retry logic of its own.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::models::{
    DemandListing, DemandListingWithOwner, MatchWithProperty, PropertyListing, PropertyMatch,
};
use crate::services::scoring::{ComponentScores, MatchDetails};

/// Options for the match read queries.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery {
    /// Include matches the user has dismissed
    pub include_dismissed: bool,
    /// Maximum rows returned, ordered by match_score descending
    pub limit: i64,
}

impl Default for MatchQuery {
    fn default() -> Self {
        Self {
            include_dismissed: false,
            limit: 10,
        }
    }
}

/// Partial update of the per-match lifecycle flags.
///
/// For every flag present, the store sets the flag and its companion
/// timestamp (`NOW()` when set, `NULL` when cleared) and bumps updated_at.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchFlagPatch {
    pub is_viewed: Option<bool>,
    pub is_saved: Option<bool>,
    pub is_dismissed: Option<bool>,
}

/// Read/write contract the matching engine needs from the backing store.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Demand listing by id, joined with its owning user via the business row
    async fn find_demand_listing_with_owner(
        &self,
        id: Uuid,
    ) -> Result<Option<DemandListingWithOwner>>;

    /// All demand listings with active status (bulk refresh input)
    async fn find_active_demand_listings(&self) -> Result<Vec<DemandListing>>;

    /// All property listings with active status, in a stable order
    async fn find_active_property_listings(&self) -> Result<Vec<PropertyListing>>;

    async fn find_match(&self, match_id: Uuid) -> Result<Option<PropertyMatch>>;

    /// Insert or update the match row for a (demand, property) pair.
    ///
    /// On conflict the score, component scores, details and updated_at are
    /// overwritten; lifecycle flags keep their current values.
    async fn upsert_match(
        &self,
        demand_listing_id: Uuid,
        property_listing_id: Uuid,
        score: f64,
        components: &ComponentScores,
        details: &MatchDetails,
    ) -> Result<PropertyMatch>;

    /// Matches for one demand listing, active properties only,
    /// score descending
    async fn find_matches_by_demand(
        &self,
        demand_listing_id: Uuid,
        query: &MatchQuery,
    ) -> Result<Vec<MatchWithProperty>>;

    /// Matches across all of a user's demand listings (via business
    /// ownership), active properties only, dismissed excluded
    async fn find_matches_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MatchWithProperty>>;

    /// Saved, non-dismissed matches for a user, most recently saved first
    async fn find_saved_matches(&self, user_id: Uuid) -> Result<Vec<MatchWithProperty>>;

    /// Apply a flag patch; None when the match id does not exist
    async fn update_match_flags(
        &self,
        match_id: Uuid,
        patch: &MatchFlagPatch,
    ) -> Result<Option<PropertyMatch>>;
}
