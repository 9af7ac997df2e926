#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::type_complexity)]

extern crate gnss_rs as gnss;
extern crate num_derive;

pub mod bits;
pub mod config;
pub mod decoder;
pub mod gnss_time;
pub mod identity;
pub mod library;
pub mod navigation;
pub mod store;

mod constants;
mod error;

#[cfg(test)]
mod tests;

pub use error::Error;

/// Package to include all basic structures
pub mod prelude {
    // export
    pub use crate::{
        bits::{BitRangeError, NavBits},
        config::{MergePolicy, NavConfig, UniquenessPolicy},
        decoder::{DecoderRegistry, DecoderStats, DecodingError, NavDecoder, RegistryError},
        error::Error,
        identity::{
            CarrierBand, NavMessageID, NavMessageType, NavMessageTypes, NavSatelliteID,
            NavSignalID, NavType, TrackingCode, Wild, WildSatID,
        },
        library::{BitSource, LoadError, LoadReport, NavLibrary, NavSource, RecordSource},
        navigation::{
            Almanac, Ephemeris, Health, Iono, Isc, NavData, NavRecord, NavSearchOrder,
            NavValidityType, SVHealth, TimeOffset, ValidityInterval, Xvt,
        },
        store::{NavStore, StoreError},
    };

    // pub re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch, TimeScale};
}
