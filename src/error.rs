use thiserror::Error;

/// Rejected user input from the CLI or the HTTP surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("invalid dimensions '{0}', expected WxH")]
    InvalidDimensions(String),

    #[error("invalid number '{value}' in '{input}'")]
    InvalidNumber { input: String, value: String },

    #[error("invalid part '{0}', expected WxH:qty or WxH:qty:fixed")]
    InvalidPart(String),

    #[error("invalid quantity in '{0}'")]
    InvalidQuantity(String),

    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },

    #[error("quantity in '{0}' must be between 1 and 999")]
    QuantityOutOfRange(String),

    #[error("at most 499 part entries are allowed, got {0}")]
    TooManyParts(usize),

    #[error("at most 10000 parts in total are allowed, got {0}")]
    TooManyUnits(u64),

    #[error("kerf must be between 0 and 10, got {0}")]
    KerfOutOfRange(f64),

    #[error("unknown mode '{0}', expected auto or horizontal")]
    UnknownMode(String),
}
