//! Matching Service
//!
//! Orchestrates the scoring of demand listings against the active property
//! pool and owns the persisted match lifecycle (view, save, dismiss, bulk
//! refresh). Scoring itself is pure ([`crate::services::scoring`]); this
//! module adds the I/O around it.
//!
//! # Lifecycle
//!
//! ```text
//! created ──▶ { viewed?, saved? }* ──▶ dismissed (terminal)
//! ```
//!
//! viewed and saved are independent flags. Re-scoring a pair refreshes its
//! score and details but never touches the flags; a dismissed pair stays
//! dismissed even if it scores highly again.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{
    MatchFlagPatch, MatchQuery, MatchStore, MatchWithProperty, PropertyListing, PropertyMatch,
};
use crate::error::MatchError;
use crate::services::notifications::{MatchSummary, NewMatchesEvent, NotificationSink};
use crate::services::scoring::{calculate_match_score, ScoreBreakdown};

/// Matches returned and persisted per demand when the caller does not ask
/// for a specific limit.
pub const DEFAULT_MATCH_LIMIT: i64 = 10;

/// Request-scoped matching engine; all state lives in the store.
pub struct MatchingService<S: MatchStore> {
    store: Arc<S>,
    notifications: Arc<dyn NotificationSink>,
    default_limit: i64,
}

impl<S: MatchStore> MatchingService<S> {
    pub fn new(store: Arc<S>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifications,
            default_limit: DEFAULT_MATCH_LIMIT,
        }
    }

    /// Override the default result limit (configuration hook).
    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Score a demand listing against every active property, persist the
    /// surviving candidates and return them joined with their property
    /// payloads.
    ///
    /// Zero-score properties are neither persisted nor returned. Candidates
    /// are ordered by score descending; equal scores keep the store's fetch
    /// order, so results are deterministic run-to-run.
    ///
    /// With `send_notification`, one best-effort event is emitted to the
    /// demand's owner when at least one match was produced. Notification
    /// failure never reaches the caller.
    pub async fn find_matches_for_demand_listing(
        &self,
        demand_listing_id: Uuid,
        limit: Option<i64>,
        send_notification: bool,
    ) -> Result<Vec<MatchWithProperty>, MatchError> {
        let demand = self
            .store
            .find_demand_listing_with_owner(demand_listing_id)
            .await?
            .ok_or(MatchError::NotFound("Demand listing"))?;

        let properties = self.store.find_active_property_listings().await?;
        let candidate_pool = properties.len();

        let mut candidates: Vec<(PropertyListing, ScoreBreakdown)> = properties
            .into_iter()
            .filter_map(|property| {
                let breakdown = calculate_match_score(&demand.listing, &property);
                (breakdown.score > 0.0).then_some((property, breakdown))
            })
            .collect();

        // Stable sort: ties keep the fetch order established by the store.
        candidates.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit.unwrap_or(self.default_limit).max(0) as usize);

        let mut results = Vec::with_capacity(candidates.len());
        for (property, breakdown) in candidates {
            let record = self
                .store
                .upsert_match(
                    demand_listing_id,
                    property.id,
                    breakdown.score,
                    &breakdown.component_scores,
                    &breakdown.details,
                )
                .await?;

            results.push(MatchWithProperty {
                record,
                property_title: property.title,
                property_city: property.city,
                property_state: property.state,
                property_sqft: property.sqft,
                property_asking_price: property.asking_price,
                property_type: property.property_type,
                property_status: property.status,
            });
        }

        tracing::info!(
            demand_listing_id = %demand_listing_id,
            candidate_pool,
            matches = results.len(),
            "matching run completed"
        );

        if send_notification && !results.is_empty() {
            let event = NewMatchesEvent {
                user_id: demand.owner_user_id,
                matches: results
                    .iter()
                    .map(|row| MatchSummary {
                        match_id: row.record.id,
                        score: row.record.match_score,
                        property_title: row.property_title.clone(),
                        property_city: row.property_city.clone(),
                        property_state: row.property_state.clone(),
                    })
                    .collect(),
            };
            self.notifications.notify_new_matches(event).await;
        }

        Ok(results)
    }

    /// Persisted matches for a demand listing, active properties only,
    /// dismissed excluded unless requested.
    pub async fn get_matches_for_demand_listing(
        &self,
        demand_listing_id: Uuid,
        query: MatchQuery,
    ) -> Result<Vec<MatchWithProperty>, MatchError> {
        Ok(self
            .store
            .find_matches_by_demand(demand_listing_id, &query)
            .await?)
    }

    /// Matches across all of a user's demand listings, best first.
    pub async fn get_matches_for_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MatchWithProperty>, MatchError> {
        Ok(self
            .store
            .find_matches_by_user(user_id, limit.unwrap_or(self.default_limit))
            .await?)
    }

    /// Mark a match as viewed. Idempotent: viewing again refreshes viewed_at.
    pub async fn mark_as_viewed(&self, match_id: Uuid) -> Result<PropertyMatch, MatchError> {
        let patch = MatchFlagPatch {
            is_viewed: Some(true),
            ..Default::default()
        };
        self.store
            .update_match_flags(match_id, &patch)
            .await?
            .ok_or(MatchError::NotFound("Match"))
    }

    /// Flip the saved flag, returning the updated row. saved_at is set when
    /// saving and cleared when unsaving.
    pub async fn toggle_saved(&self, match_id: Uuid) -> Result<PropertyMatch, MatchError> {
        let current = self
            .store
            .find_match(match_id)
            .await?
            .ok_or(MatchError::NotFound("Match"))?;

        let patch = MatchFlagPatch {
            is_saved: Some(!current.is_saved),
            ..Default::default()
        };
        self.store
            .update_match_flags(match_id, &patch)
            .await?
            .ok_or(MatchError::NotFound("Match"))
    }

    /// Dismiss a match. Terminal: no undismiss operation exists, and
    /// re-scoring the pair does not reset the flag.
    pub async fn dismiss_match(&self, match_id: Uuid) -> Result<PropertyMatch, MatchError> {
        let patch = MatchFlagPatch {
            is_dismissed: Some(true),
            ..Default::default()
        };
        self.store
            .update_match_flags(match_id, &patch)
            .await?
            .ok_or(MatchError::NotFound("Match"))
    }

    /// Recompute matches for every active demand listing, notifications
    /// disabled. One demand failing must not abort the sweep: the failure is
    /// logged and the demand skipped. Returns the total number of matches
    /// produced by the demands that succeeded.
    pub async fn refresh_all_matches(&self) -> Result<u64, MatchError> {
        let demands = self.store.find_active_demand_listings().await?;
        let demand_count = demands.len();

        let mut total: u64 = 0;
        let mut failed: usize = 0;
        for demand in demands {
            match self
                .find_matches_for_demand_listing(demand.id, None, false)
                .await
            {
                Ok(matches) => total += matches.len() as u64,
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        demand_listing_id = %demand.id,
                        error = %err,
                        "match refresh failed for demand, skipping"
                    );
                }
            }
        }

        tracing::info!(
            demands = demand_count,
            failed,
            total_matches = total,
            "bulk match refresh completed"
        );
        Ok(total)
    }

    /// Saved, non-dismissed matches for a user, most recently saved first.
    pub async fn get_saved_matches(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<MatchWithProperty>, MatchError> {
        Ok(self.store.find_saved_matches(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    use crate::db::mock::MockMatchStore;
    use crate::db::models::{DemandListing, PropertyListing};

    /// Sink that records events without affecting control flow.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<NewMatchesEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<NewMatchesEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify_new_matches(&self, event: NewMatchesEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn demand() -> DemandListing {
        DemandListing {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            city: "Miami".to_string(),
            state: "FL".to_string(),
            sqft_min: Some(1000),
            sqft_max: Some(2000),
            budget_min: Some(5000.0),
            budget_max: Some(8000.0),
            asset_type: Some("retail".to_string()),
            additional_features: vec!["parking".to_string()],
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn property(title: &str) -> PropertyListing {
        PropertyListing {
            id: Uuid::new_v4(),
            title: title.to_string(),
            city: "Miami".to_string(),
            state: "FL".to_string(),
            sqft: 1500,
            asking_price: Some(6000.0),
            property_type: "retail".to_string(),
            amenities: vec!["Parking Lot".to_string()],
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Property that scores zero against [`demand`]: wrong state, far out of
    /// range on size and price, incompatible type, no amenities.
    fn hopeless_property() -> PropertyListing {
        PropertyListing {
            sqft: 50_000,
            asking_price: Some(90_000.0),
            city: "Phoenix".to_string(),
            state: "AZ".to_string(),
            property_type: "office".to_string(),
            amenities: vec![],
            ..property("Desert Tower")
        }
    }

    fn service(
        store: &Arc<MockMatchStore>,
        sink: &Arc<RecordingSink>,
    ) -> MatchingService<MockMatchStore> {
        MatchingService::new(Arc::clone(store), Arc::clone(sink) as Arc<dyn NotificationSink>)
    }

    fn setup() -> (
        Arc<MockMatchStore>,
        Arc<RecordingSink>,
        MatchingService<MockMatchStore>,
    ) {
        let store = Arc::new(MockMatchStore::new());
        let sink = Arc::new(RecordingSink::default());
        let svc = service(&store, &sink);
        (store, sink, svc)
    }

    #[tokio::test]
    async fn unknown_demand_is_not_found() {
        let (_store, _sink, svc) = setup();

        let err = svc
            .find_matches_for_demand_listing(Uuid::new_v4(), None, false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Demand listing not found");
    }

    #[tokio::test]
    async fn zero_score_properties_are_not_persisted() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(hopeless_property());

        let matches = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();

        assert!(matches.is_empty());
        assert_eq!(store.match_count(), 0);
    }

    #[tokio::test]
    async fn rerunning_does_not_duplicate_matches() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(property("Bayfront Retail"));

        let first = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        let second = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();

        assert_eq!(store.match_count(), 1);
        assert_eq!(first[0].record.id, second[0].record.id);
        assert_eq!(first[0].record.match_score, second[0].record.match_score);
    }

    #[tokio::test]
    async fn results_are_sorted_and_limited() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());

        // Perfect match, a same-state-only match, and a weaker in-city match
        store.insert_property(PropertyListing {
            city: "Orlando".to_string(),
            ..property("Orlando Strip Mall")
        });
        store.insert_property(property("Bayfront Retail"));
        store.insert_property(PropertyListing {
            sqft: 2100,
            ..property("Oversized Bayfront")
        });

        let matches = svc
            .find_matches_for_demand_listing(d.id, Some(2), false)
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(store.match_count(), 2);
        assert_eq!(matches[0].property_title, "Bayfront Retail");
        assert!(matches[0].record.match_score >= matches[1].record.match_score);
    }

    #[tokio::test]
    async fn negative_limit_yields_no_matches() {
        let (store, _sink, svc) = setup();
        let user = Uuid::new_v4();
        let d = demand();
        store.insert_demand(d.clone(), user);
        store.insert_property(property("Bayfront Retail"));

        let matches = svc
            .find_matches_for_demand_listing(d.id, Some(-1), false)
            .await
            .unwrap();
        assert!(matches.is_empty());
        assert_eq!(store.match_count(), 0);

        // Same clamp on the read side
        svc.find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        let mine = svc.get_matches_for_user(user, Some(-5)).await.unwrap();
        assert!(mine.is_empty());
    }

    #[tokio::test]
    async fn inactive_properties_are_ignored() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(PropertyListing {
            status: "leased".to_string(),
            ..property("Already Leased")
        });

        let matches = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn notification_carries_match_summaries() {
        let (store, sink, svc) = setup();
        let d = demand();
        let owner = Uuid::new_v4();
        store.insert_demand(d.clone(), owner);
        store.insert_property(property("Bayfront Retail"));

        svc.find_matches_for_demand_listing(d.id, None, true)
            .await
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, owner);
        assert_eq!(events[0].matches.len(), 1);
        assert_eq!(events[0].matches[0].property_title, "Bayfront Retail");
        assert_eq!(events[0].matches[0].property_city, "Miami");
        assert_eq!(events[0].matches[0].score, 100.0);
    }

    #[tokio::test]
    async fn no_notification_when_disabled_or_empty() {
        let (store, sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(property("Bayfront Retail"));

        // Flag off
        svc.find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        assert!(sink.events().is_empty());

        // Flag on but zero matches produced
        let unmatchable = DemandListing {
            id: Uuid::new_v4(),
            city: "Nome".to_string(),
            state: "AK".to_string(),
            sqft_min: Some(100),
            sqft_max: Some(200),
            budget_max: Some(10.0),
            asset_type: Some("land".to_string()),
            additional_features: vec!["helipad".to_string()],
            ..demand()
        };
        store.insert_demand(unmatchable.clone(), Uuid::new_v4());

        let matches = svc
            .find_matches_for_demand_listing(unmatchable.id, None, true)
            .await
            .unwrap();
        assert!(matches.is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn dismissed_matches_stay_hidden_after_rescoring() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(property("Bayfront Retail"));

        let matches = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        let match_id = matches[0].record.id;

        let dismissed = svc.dismiss_match(match_id).await.unwrap();
        assert!(dismissed.is_dismissed);
        assert!(dismissed.dismissed_at.is_some());

        // Default read excludes it
        let visible = svc
            .get_matches_for_demand_listing(d.id, MatchQuery::default())
            .await
            .unwrap();
        assert!(visible.is_empty());

        // Re-scoring upserts the same row but must not reset the flag
        svc.find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        let visible = svc
            .get_matches_for_demand_listing(d.id, MatchQuery::default())
            .await
            .unwrap();
        assert!(visible.is_empty());

        // Explicit opt-in still shows it, flag intact
        let all = svc
            .get_matches_for_demand_listing(
                d.id,
                MatchQuery {
                    include_dismissed: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].record.is_dismissed);
    }

    #[tokio::test]
    async fn toggle_saved_round_trips() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(property("Bayfront Retail"));

        let matches = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        let match_id = matches[0].record.id;

        let saved = svc.toggle_saved(match_id).await.unwrap();
        assert!(saved.is_saved);
        assert!(saved.saved_at.is_some());

        let unsaved = svc.toggle_saved(match_id).await.unwrap();
        assert!(!unsaved.is_saved);
        assert!(unsaved.saved_at.is_none());
    }

    #[tokio::test]
    async fn mark_as_viewed_sets_timestamp() {
        let (store, _sink, svc) = setup();
        let d = demand();
        store.insert_demand(d.clone(), Uuid::new_v4());
        store.insert_property(property("Bayfront Retail"));

        let matches = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();
        let viewed = svc.mark_as_viewed(matches[0].record.id).await.unwrap();

        assert!(viewed.is_viewed);
        assert!(viewed.viewed_at.is_some());
        // Orthogonal flags untouched
        assert!(!viewed.is_saved);
        assert!(!viewed.is_dismissed);
    }

    #[tokio::test]
    async fn lifecycle_calls_on_unknown_match_are_not_found() {
        let (_store, _sink, svc) = setup();
        assert!(svc.mark_as_viewed(Uuid::new_v4()).await.unwrap_err().is_not_found());
        assert!(svc.toggle_saved(Uuid::new_v4()).await.unwrap_err().is_not_found());
        assert!(svc.dismiss_match(Uuid::new_v4()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn refresh_counts_matches_across_demands() {
        let (store, sink, svc) = setup();
        let first = demand();
        let second = DemandListing {
            id: Uuid::new_v4(),
            ..demand()
        };
        store.insert_demand(first, Uuid::new_v4());
        store.insert_demand(second, Uuid::new_v4());
        store.insert_property(property("Bayfront Retail"));
        store.insert_property(property("Harbor Shops"));

        let total = svc.refresh_all_matches().await.unwrap();

        // Two demands, two matching properties each
        assert_eq!(total, 4);
        assert_eq!(store.match_count(), 4);
        // Bulk refresh never notifies
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn refresh_skips_failing_demands() {
        let (store, _sink, svc) = setup();
        let healthy = demand();
        store.insert_demand(healthy, Uuid::new_v4());
        // Active but unresolvable to an owner: fails with NotFound mid-sweep
        store.insert_orphan_demand(DemandListing {
            id: Uuid::new_v4(),
            ..demand()
        });
        store.insert_property(property("Bayfront Retail"));

        let total = svc.refresh_all_matches().await.unwrap();

        // The orphan is skipped, the healthy demand still counts
        assert_eq!(total, 1);
        assert_eq!(store.match_count(), 1);
    }

    #[tokio::test]
    async fn inactive_demands_are_not_refreshed() {
        let (store, _sink, svc) = setup();
        store.insert_demand(
            DemandListing {
                status: "inactive".to_string(),
                ..demand()
            },
            Uuid::new_v4(),
        );
        store.insert_property(property("Bayfront Retail"));

        let total = svc.refresh_all_matches().await.unwrap();
        assert_eq!(total, 0);
        assert_eq!(store.match_count(), 0);
    }

    #[tokio::test]
    async fn user_matches_span_all_their_demands() {
        let (store, _sink, svc) = setup();
        let user = Uuid::new_v4();
        let other_user = Uuid::new_v4();

        let mine_a = demand();
        let mine_b = DemandListing {
            id: Uuid::new_v4(),
            ..demand()
        };
        let theirs = DemandListing {
            id: Uuid::new_v4(),
            ..demand()
        };
        store.insert_demand(mine_a.clone(), user);
        store.insert_demand(mine_b.clone(), user);
        store.insert_demand(theirs.clone(), other_user);
        store.insert_property(property("Bayfront Retail"));

        svc.refresh_all_matches().await.unwrap();

        let mine = svc.get_matches_for_user(user, None).await.unwrap();
        assert_eq!(mine.len(), 2);
        let other = svc.get_matches_for_user(other_user, None).await.unwrap();
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn saved_matches_exclude_dismissed() {
        let (store, _sink, svc) = setup();
        let user = Uuid::new_v4();
        let d = demand();
        store.insert_demand(d.clone(), user);
        store.insert_property(property("Bayfront Retail"));
        store.insert_property(property("Harbor Shops"));

        let matches = svc
            .find_matches_for_demand_listing(d.id, None, false)
            .await
            .unwrap();

        svc.toggle_saved(matches[0].record.id).await.unwrap();
        svc.toggle_saved(matches[1].record.id).await.unwrap();
        svc.dismiss_match(matches[1].record.id).await.unwrap();

        let saved = svc.get_saved_matches(user).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].record.id, matches[0].record.id);
    }
}
