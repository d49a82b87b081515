//! Request and response types

pub mod error;
pub mod predict;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use predict::EncodedPredictRequest;
