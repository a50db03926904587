//! REST client for the site management backend.
//!
//! [`Authenticator`] owns the bearer token. [`CloudClient`] sends every
//! backend call through one authenticated request primitive that retries
//! transient failures and re-authenticates once when the backend answers
//! 401.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use auth::Authenticator;
pub use client::CloudClient;
pub use config::CloudConfig;
pub use error::{CloudError, Result};
pub use models::{
    AlertRequest, BaseStation, CloudMetric, CommandResultReport, DiagnosisRequest,
    DiagnosisResponse, MetricsBatchRequest, MetricsBatchResponse, PendingCommand,
    StationRegistration, StatusUpdate,
};
