use thiserror::Error;

/// Failure modes of the byte-bitmap adapter in [`crate::convert`].
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("invalid hex bitmap")]
    InvalidHex(#[from] hex::FromHexError),
}
