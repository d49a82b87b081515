//! Infrastructure layer - Storage clients, ingestion, models and services

pub mod cache;
pub mod ingestion;
pub mod logging;
pub mod ml;
pub mod observability;
pub mod services;
pub mod storage;
