use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid hash length")]
    InvalidHashLength,

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount {0} is not a multiple of the 1e9 scale")]
    DustAmount(String),

    #[error("Amount {0} does not fit the 64-bit encoding")]
    AmountTooLarge(String),
}
