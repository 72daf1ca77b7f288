//! # Brick Tracker
//!
//! Offline-first sync engine for a LEGO set tracker.
//!
//! Every change is written to the local SQLite store first and then pushed to
//! the tracker backend. Changes that cannot be sent are kept in a durable
//! queue and replayed later; remote progress is merged back with
//! last-write-wins on `updated_at`.
//!
//! ```rust,ignore
//! use brick_tracker::config::AppConfig;
//! use brick_tracker::models::ProgressKey;
//! use brick_tracker::services::SyncService;
//!
//! let service = SyncService::from_config(&AppConfig::default())?;
//! service
//!     .update_progress(&ProgressKey::new("75192-1", "3001", 1, false), 3, None)
//!     .await?;
//! let summary = service.replay().await?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;

pub use error::AppError;
