pub mod config;
pub use config::{ApiConfig, Config, LoggingConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("not logged in")]
    Unauthenticated,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl DashboardError {
    /// Message safe to show an end user. Details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            DashboardError::Unauthenticated => "Please log in to view this page.",
            DashboardError::InvalidInput(_) => "Oops! Invalid input.",
            _ => "Oops! Something went wrong. Please try again later.",
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, DashboardError::Unauthenticated)
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_get_their_own_message() {
        let e = DashboardError::InvalidInput("bin_count must be greater than 1.".into());
        assert_eq!(e.user_message(), "Oops! Invalid input.");
    }

    #[test]
    fn network_failures_fall_back_to_try_again_later() {
        let e = DashboardError::Unavailable("HTTP 502".into());
        assert_eq!(e.user_message(), "Oops! Something went wrong. Please try again later.");
        assert!(!e.is_unauthenticated());
        assert!(DashboardError::Unauthenticated.is_unauthenticated());
    }

    #[test]
    fn every_variant_maps_to_one_of_three_messages() {
        let errors = [
            DashboardError::Io(std::io::Error::other("disk")),
            DashboardError::Http("reset".into()),
            DashboardError::Decode(serde_json::from_str::<u8>("x").unwrap_err()),
            DashboardError::Config("bad url".into()),
            DashboardError::Unauthenticated,
            DashboardError::InvalidInput("bin_size".into()),
            DashboardError::NotFound("x/histogram".into()),
            DashboardError::Unavailable("HTTP 503".into()),
        ];
        for e in &errors {
            // exhaustive: a new variant must be listed above
            match e {
                DashboardError::Io(_)
                | DashboardError::Http(_)
                | DashboardError::Decode(_)
                | DashboardError::Config(_)
                | DashboardError::Unauthenticated
                | DashboardError::InvalidInput(_)
                | DashboardError::NotFound(_)
                | DashboardError::Unavailable(_) => {}
            }
            assert!(["Please log in to view this page.", "Oops! Invalid input.", "Oops! Something went wrong. Please try again later."].contains(&e.user_message()));
        }
    }
}
