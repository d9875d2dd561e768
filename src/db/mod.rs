//! Database Module
//!
//! PostgreSQL access for the matching engine, built on SQLx.
//!
//! # Design Decision
//!
//! Match uniqueness is enforced here, not in application code: the
//! `property_matches` table carries a UNIQUE constraint on the
//! (demand_listing_id, property_listing_id) pair and [`Database::upsert_match`]
//! uses `ON CONFLICT ... DO UPDATE`. Concurrent recomputation of the same
//! pair is therefore last-write-wins instead of duplicate-producing, and the
//! matcher needs no in-process locking.

pub mod models;
mod store;

pub use models::*;
pub use store::{MatchFlagPatch, MatchQuery, MatchStore};

#[cfg(test)]
pub use store::mock;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::services::scoring::{ComponentScores, MatchDetails};

/// Columns selected when joining a match row with its property payload.
const MATCH_WITH_PROPERTY_COLUMNS: &str = r#"
    m.*,
    p.title AS property_title,
    p.city AS property_city,
    p.state AS property_state,
    p.sqft AS property_sqft,
    p.asking_price AS property_asking_price,
    p.property_type AS property_type,
    p.status AS property_status
"#;

/// Connection pool wrapper exposing the queries the matcher needs.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10
    /// - min_connections: 1
    /// - acquire_timeout: 3s
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MatchStore for Database {
    async fn find_demand_listing_with_owner(
        &self,
        id: Uuid,
    ) -> Result<Option<DemandListingWithOwner>> {
        let listing = sqlx::query_as::<_, DemandListingWithOwner>(
            r#"
            SELECT d.*, b.user_id AS owner_user_id
            FROM demand_listings d
            JOIN businesses b ON b.id = d.business_id
            WHERE d.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    async fn find_active_demand_listings(&self) -> Result<Vec<DemandListing>> {
        let listings = sqlx::query_as::<_, DemandListing>(
            r#"
            SELECT *
            FROM demand_listings
            WHERE status = 'active'
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    async fn find_active_property_listings(&self) -> Result<Vec<PropertyListing>> {
        // Stable ordering keeps equal-score candidates deterministic
        // run-to-run (ties are broken by fetch order downstream).
        let listings = sqlx::query_as::<_, PropertyListing>(
            r#"
            SELECT *
            FROM property_listings
            WHERE status = 'active'
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    async fn find_match(&self, match_id: Uuid) -> Result<Option<PropertyMatch>> {
        let record = sqlx::query_as::<_, PropertyMatch>(
            "SELECT * FROM property_matches WHERE id = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert_match(
        &self,
        demand_listing_id: Uuid,
        property_listing_id: Uuid,
        score: f64,
        components: &ComponentScores,
        details: &MatchDetails,
    ) -> Result<PropertyMatch> {
        // Lifecycle flags take their defaults only on first insert; the
        // conflict arm deliberately leaves them untouched, so a dismissed
        // pair stays dismissed across re-scoring.
        let record = sqlx::query_as::<_, PropertyMatch>(
            r#"
            INSERT INTO property_matches (
                demand_listing_id, property_listing_id, match_score,
                location_score, sqft_score, price_score,
                asset_type_score, amenities_score, match_details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (demand_listing_id, property_listing_id)
            DO UPDATE SET
                match_score = EXCLUDED.match_score,
                location_score = EXCLUDED.location_score,
                sqft_score = EXCLUDED.sqft_score,
                price_score = EXCLUDED.price_score,
                asset_type_score = EXCLUDED.asset_type_score,
                amenities_score = EXCLUDED.amenities_score,
                match_details = EXCLUDED.match_details,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(demand_listing_id)
        .bind(property_listing_id)
        .bind(score)
        .bind(components.location)
        .bind(components.sqft)
        .bind(components.price)
        .bind(components.asset_type)
        .bind(components.amenities)
        .bind(Json(details))
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_matches_by_demand(
        &self,
        demand_listing_id: Uuid,
        query: &MatchQuery,
    ) -> Result<Vec<MatchWithProperty>> {
        let sql = format!(
            r#"
            SELECT {MATCH_WITH_PROPERTY_COLUMNS}
            FROM property_matches m
            JOIN property_listings p ON p.id = m.property_listing_id
            WHERE m.demand_listing_id = $1
              AND p.status = 'active'
              AND ($2 OR NOT m.is_dismissed)
            ORDER BY m.match_score DESC
            LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, MatchWithProperty>(&sql)
            .bind(demand_listing_id)
            .bind(query.include_dismissed)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn find_matches_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MatchWithProperty>> {
        let sql = format!(
            r#"
            SELECT {MATCH_WITH_PROPERTY_COLUMNS}
            FROM property_matches m
            JOIN property_listings p ON p.id = m.property_listing_id
            JOIN demand_listings d ON d.id = m.demand_listing_id
            JOIN businesses b ON b.id = d.business_id
            WHERE b.user_id = $1
              AND p.status = 'active'
              AND NOT m.is_dismissed
            ORDER BY m.match_score DESC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, MatchWithProperty>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn find_saved_matches(&self, user_id: Uuid) -> Result<Vec<MatchWithProperty>> {
        let sql = format!(
            r#"
            SELECT {MATCH_WITH_PROPERTY_COLUMNS}
            FROM property_matches m
            JOIN property_listings p ON p.id = m.property_listing_id
            JOIN demand_listings d ON d.id = m.demand_listing_id
            JOIN businesses b ON b.id = d.business_id
            WHERE b.user_id = $1
              AND m.is_saved
              AND NOT m.is_dismissed
              AND p.status = 'active'
            ORDER BY m.saved_at DESC
            "#
        );

        let rows = sqlx::query_as::<_, MatchWithProperty>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn update_match_flags(
        &self,
        match_id: Uuid,
        patch: &MatchFlagPatch,
    ) -> Result<Option<PropertyMatch>> {
        // NULL parameters leave a flag untouched; a set flag also sets or
        // clears its companion timestamp.
        let record = sqlx::query_as::<_, PropertyMatch>(
            r#"
            UPDATE property_matches SET
                is_viewed = COALESCE($2, is_viewed),
                viewed_at = CASE
                    WHEN $2 IS NULL THEN viewed_at
                    WHEN $2 THEN NOW()
                    ELSE NULL
                END,
                is_saved = COALESCE($3, is_saved),
                saved_at = CASE
                    WHEN $3 IS NULL THEN saved_at
                    WHEN $3 THEN NOW()
                    ELSE NULL
                END,
                is_dismissed = COALESCE($4, is_dismissed),
                dismissed_at = CASE
                    WHEN $4 IS NULL THEN dismissed_at
                    WHEN $4 THEN NOW()
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(match_id)
        .bind(patch.is_viewed)
        .bind(patch.is_saved)
        .bind(patch.is_dismissed)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
