//! Library exports for portal-client, shared between the binary and tests.

pub mod client;
pub mod config;
pub mod events;
pub mod metrics;
pub mod models;
pub mod startup;
pub mod store;
pub mod utils;

pub use client::{ApiClient, ApiError, ApiRequest, ApiResponse};
pub use events::{EventBus, PortalEvent};
pub use models::{AccessToken, Session, UserProfile};
