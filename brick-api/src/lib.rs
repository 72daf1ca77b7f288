//! # Brick API
//!
//! HTTP client for the brick-tracker backend.
//!
//! This crate provides:
//! - Wire models for sets, inventories and per-part progress
//! - `BrickApiClient`, one method per backend endpoint
//! - A health probe used for connectivity checks
//!
//! ## Separation of Concerns
//!
//! This crate only talks HTTP. It does **not**:
//! - Cache anything locally (handled by the application store)
//! - Retry failed calls (handled by the application sync queue)
//! - Resolve conflicts between local and remote progress
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use brick_api::{BrickApiClient, BrickApiConfig};
//!
//! let client = BrickApiClient::new(BrickApiConfig {
//!     base_url: "https://bricks.example.com".to_string(),
//!     ..BrickApiConfig::default()
//! })?;
//! let rows = client.get_progress("75192-1").await?;
//! ```

pub mod models;
pub mod service;

pub use models::{
    BrickApiConfig, BulkProgressRequest, InventoryPayload, MinifigEntry, PartLine, ProgressRow,
    RemoteProgressRow, SetFlagsPatch, SetPayload,
};
pub use service::{ApiError, BrickApiClient};
