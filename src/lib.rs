//! Storefront - Self-hosted Storefront Backend
//!
//! REST backend for an e-commerce storefront over PostgreSQL.
//!
//! ## Features
//! - Product catalog with search, ordering and inventory filters
//! - Categories and product comments
//! - Ephemeral shopping carts
//! - Customer profiles with a self-service endpoint
//! - Checkout: carts become orders in one transaction
//! - Domain events over NATS

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod pagination;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
