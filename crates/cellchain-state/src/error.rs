use thiserror::Error;

/// Failure of a checked numeric operation. The cell is left untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Arithmetic underflow")]
    Underflow,

    #[error("Division by zero")]
    DivByZero,

    #[error("Modulo by zero")]
    ModByZero,
}

/// Access outside a container's current contents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoundsError {
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("Key not found")]
    KeyNotFound,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error("No call scope is open")]
    ScopeNotOpen,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Core error: {0}")]
    Core(#[from] cellchain_core::CoreError),
}
