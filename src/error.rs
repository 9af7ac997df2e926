use thiserror::Error;

use crate::{
    bits::BitRangeError, decoder::DecodingError, decoder::RegistryError, library::LoadError,
    navigation::OrbitError, store::StoreError,
};

/// Errors that may rise anywhere in this library.
/// Each concern has its own dedicated error type,
/// this one simply aggregates them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("bit container error: {0}")]
    BitRange(#[from] BitRangeError),
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),
    #[error("decoder registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("source loading error: {0}")]
    Load(#[from] LoadError),
    #[error("orbit error: {0}")]
    Orbit(#[from] OrbitError),
}
