//! Error types for the simulation engine and the editing commands.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("pin {pin_index} out of range for element {el_id} ({pin_count} pins)")]
    PinOutOfRange {
        el_id: String,
        pin_index: usize,
        pin_count: usize,
    },

    #[error("duplicate element id: {0}")]
    DuplicateElement(String),

    #[error("input #{0} not found")]
    InputNotFound(usize),

    #[error("connection #{0} not found")]
    ConnectionNotFound(usize),

    #[error("truth table over {count} inputs exceeds the limit of {max}")]
    TooManyInputs { count: usize, max: usize },
}
