//! Signal keyed decoder registry
use std::collections::HashMap;

use log::{debug, error, warn};
use thiserror::Error;

use crate::{
    bits::NavBits,
    decoder::{
        BdsD1Decoder, BdsD2Decoder, DecoderStats, DecodingError, GalFnavDecoder, GalInavDecoder,
        GloFnavDecoder, GpsCnav2Decoder, GpsCnavDecoder, GpsLnavDecoder, NavDecoder,
    },
    identity::{NavMessageTypes, NavSignalID},
    navigation::NavRecord,
};

/// Registration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("a decoder is already registered for {0}")]
    Duplicate(NavSignalID),
    #[error("decoders must advertise exact signals, not {0}")]
    WildSignal(NavSignalID),
}

/// [DecoderRegistry] routes [NavBits] to the decoder that advertised
/// their exact signal. Registries are plain values: build as many as
/// needed, each owns its decoders.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn NavDecoder>>,
    routes: HashMap<NavSignalID, usize>,
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.decoders.len())
            .field("signals", &self.routes.len())
            .finish()
    }
}

impl DecoderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one decoder per supported message family
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let decoders: Vec<Box<dyn NavDecoder>> = vec![
            Box::new(GpsLnavDecoder::new()),
            Box::new(GpsCnavDecoder::new()),
            Box::new(GpsCnav2Decoder::new()),
            Box::new(GalInavDecoder::new()),
            Box::new(GalFnavDecoder::new()),
            Box::new(BdsD1Decoder::new()),
            Box::new(BdsD2Decoder::new()),
            Box::new(GloFnavDecoder::new()),
        ];
        for decoder in decoders {
            if let Err(e) = registry.register(decoder) {
                error!("registry: {}", e);
            }
        }
        registry
    }

    /// Registers a decoder for every signal it advertises.
    /// Signals already routed keep their first decoder, the first such
    /// conflict is reported. The decoder is kept when at least one
    /// of its signals was routed to it.
    pub fn register(&mut self, decoder: Box<dyn NavDecoder>) -> Result<(), RegistryError> {
        let index = self.decoders.len();
        let mut routed = false;
        let mut conflict = None;
        for signal in decoder.signals() {
            if !signal.is_exact() {
                warn!("registry: wildcard capability {} ignored", signal);
                conflict.get_or_insert(RegistryError::WildSignal(*signal));
                continue;
            }
            if self.routes.contains_key(signal) {
                warn!("registry: {} already registered", signal);
                conflict.get_or_insert(RegistryError::Duplicate(*signal));
                continue;
            }
            debug!("registry: {} -> decoder #{}", signal, index);
            self.routes.insert(*signal, index);
            routed = true;
        }
        if routed {
            self.decoders.push(decoder);
        }
        match conflict {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Signals this registry can decode
    pub fn signals(&self) -> Vec<NavSignalID> {
        let mut signals: Vec<_> = self.routes.keys().copied().collect();
        signals.sort();
        signals
    }

    /// Number of registered decoders
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decoder in charge of `signal`
    pub fn decoder(&self, signal: &NavSignalID) -> Option<&dyn NavDecoder> {
        let index = *self.routes.get(signal)?;
        self.decoders.get(index).map(|decoder| decoder.as_ref())
    }

    /// Mutable access to the decoder in charge of `signal`
    pub fn decoder_mut(&mut self, signal: &NavSignalID) -> Option<&mut Box<dyn NavDecoder>> {
        let index = *self.routes.get(signal)?;
        self.decoders.get_mut(index)
    }

    /// Routes one unit to its decoder
    pub fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        match self.decoder_mut(&bits.signal) {
            Some(decoder) => decoder.decode(bits),
            None => {
                debug!("registry: no decoder for {}", bits.signal);
                Err(DecodingError::UnexpectedSignal)
            },
        }
    }

    /// Counters of the decoder in charge of `signal`
    pub fn stats(&self, signal: &NavSignalID) -> Option<DecoderStats> {
        self.decoder(signal).map(|decoder| *decoder.stats())
    }

    /// Applies the type filter to every decoder
    pub fn set_type_filter(&mut self, types: NavMessageTypes) {
        for decoder in self.decoders.iter_mut() {
            decoder.set_type_filter(types);
        }
    }

    /// Resets every decoder
    pub fn reset(&mut self) {
        for decoder in self.decoders.iter_mut() {
            decoder.reset();
        }
    }
}
