//! Property-to-Demand Matching Engine
//!
//! # Overview
//!
//! Core matching subsystem of the commercial real-estate marketplace:
//! tenants post space demands (QFPs), landlords list properties, and this
//! crate scores the two sides against each other, persists the resulting
//! matches and drives their save/dismiss/view lifecycle. The REST layer,
//! auth and UI live outside and consume this crate through [`AppState`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              REST / WebSocket layer (external)           │
//! └────────────────────────────┬────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼────────────────────────────┐
//! │                       AppState                           │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │                 MatchingService                    │  │
//! │  │   scoring (pure)  ·  lifecycle  ·  bulk refresh    │  │
//! │  └────────┬─────────────────────────────────┬────────┘  │
//! │           │                                 │            │
//! │  ┌────────▼────────┐              ┌────────▼─────────┐  │
//! │  │   MatchStore    │              │ NotificationSink │  │
//! │  │  (PostgreSQL)   │              │ (broadcast hub)  │  │
//! │  └─────────────────┘              └──────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `error`: error taxonomy
//! - `services`: scoring, matching lifecycle, notifications
//! - `db`: PostgreSQL store and the `MatchStore` trait
//!
//! ## Usage
//!
//! ```rust,ignore
//! use propmatch::{AppState, Config, Database};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     db.run_migrations().await?;
//!
//!     let state = AppState::new(db, config);
//!     let matches = state
//!         .matching
//!         .find_matches_for_demand_listing(demand_id, None, true)
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod services;

// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::MatchError;
pub use services::{MatchingService, NotificationHub, NotificationSink};

/// Application-wide state, composed once at startup and shared with the
/// embedding server.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub matching: Arc<MatchingService<Database>>,
    /// Notification hub; delivery workers subscribe here
    pub notifications: Arc<NotificationHub>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let db = Arc::new(db);
        let notifications = Arc::new(NotificationHub::new());
        let matching = Arc::new(
            MatchingService::new(
                Arc::clone(&db),
                Arc::clone(&notifications) as Arc<dyn NotificationSink>,
            )
            .with_default_limit(config.match_limit),
        );

        Self {
            db,
            matching,
            notifications,
            config: Arc::new(config),
        }
    }
}
