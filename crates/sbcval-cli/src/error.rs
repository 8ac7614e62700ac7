use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] sbcval_core::ValidationError),

    #[error(transparent)]
    Pricing(#[from] sbcval_core::PricingError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Store(#[from] sbcval_core::StoreError),

    #[error(transparent)]
    Warehouse(#[from] sbcval_warehouse::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Pricing(_) | Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::Store(_) | Self::Warehouse(_) => 6,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_distinct_exit_codes() {
        let validation = CliError::from(sbcval_core::ValidationError::InvalidFrequency {
            value: String::from("hourly"),
        });
        let store = CliError::from(sbcval_core::StoreError::backend("disk full"));
        let io = CliError::from(std::io::Error::other("closed pipe"));

        assert_eq!(validation.exit_code(), 2);
        assert_eq!(store.exit_code(), 6);
        assert_eq!(io.exit_code(), 10);
    }
}
