//! Multi source navigation library.
//!
//! A [NavLibrary] gathers several [NavStore]s, each filled once by a
//! [NavSource], and answers point in time queries across all of them.
use std::{io::Write, sync::Arc};

use log::{debug, warn};
use thiserror::Error;

use crate::{
    bits::NavBits,
    config::{MergePolicy, NavConfig},
    decoder::DecoderRegistry,
    identity::{
        NavMessageID, NavMessageType, NavMessageTypes, NavSatelliteID, NavSignalID, WildSatID,
    },
    navigation::{NavRecord, NavSearchOrder, NavValidityType, SVHealth, Xvt},
    prelude::{Epoch, TimeScale, SV},
    store::{NavStore, StoreError},
};

/// Source loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("source error: {0}")]
    Source(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// A provider of navigation records
pub trait NavSource {
    /// Name used in traces and reports
    fn name(&self) -> &str;
    /// Inserts every record of this source into `sink`.
    /// Returns the number of records that changed the store.
    fn load(&mut self, sink: &NavStore) -> Result<usize, LoadError>;
}

/// Inserts one record, records the store refuses softly are skipped
fn feed(sink: &NavStore, record: NavRecord) -> Result<bool, LoadError> {
    match sink.insert(record) {
        Ok(changed) => Ok(changed),
        Err(StoreError::Filtered) => Ok(false),
        Err(StoreError::Validation) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// [RecordSource] provides already decoded records
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    name: String,
    records: Vec<NavRecord>,
}

impl RecordSource {
    pub fn new(name: &str, records: Vec<NavRecord>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }
}

impl NavSource for RecordSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn load(&mut self, sink: &NavStore) -> Result<usize, LoadError> {
        let mut inserted = 0;
        for record in std::mem::take(&mut self.records) {
            if feed(sink, record)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// [BitSource] decodes raw transmission units with a [DecoderRegistry]
#[derive(Debug)]
pub struct BitSource {
    name: String,
    units: Vec<NavBits>,
    registry: DecoderRegistry,
    /// Units that could not be decoded
    pub errors: usize,
}

impl BitSource {
    /// Decodes `units` with the standard decoders
    pub fn new(name: &str, units: Vec<NavBits>) -> Self {
        Self::with_registry(name, units, DecoderRegistry::standard())
    }

    /// Decodes `units` with the provided decoders
    pub fn with_registry(name: &str, units: Vec<NavBits>, registry: DecoderRegistry) -> Self {
        Self {
            name: name.to_string(),
            units,
            registry,
            errors: 0,
        }
    }

    /// Decoders in use, with their counters
    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }
}

impl NavSource for BitSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn load(&mut self, sink: &NavStore) -> Result<usize, LoadError> {
        self.registry.set_type_filter(sink.type_filter());
        let mut inserted = 0;
        for bits in std::mem::take(&mut self.units) {
            match self.registry.decode(&bits) {
                Ok(records) => {
                    for record in records {
                        if feed(sink, record)? {
                            inserted += 1;
                        }
                    }
                },
                Err(e) => {
                    debug!("{}: {}({}) {}", self.name, bits.sv, bits.xmit, e);
                    self.errors += 1;
                },
            }
        }
        Ok(inserted)
    }
}

/// Outcome of loading one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Source name
    pub name: String,
    /// Records that changed the store
    pub inserted: usize,
    /// Records in the store after loading
    pub stored: usize,
    /// Satellites the store has records about
    pub satellites: usize,
    /// Records dropped for failing validation
    pub rejected: usize,
}

/// [NavLibrary] answers queries across an ordered list of stores
#[derive(Debug, Default)]
pub struct NavLibrary {
    config: NavConfig,
    stores: Vec<(String, Arc<NavStore>)>,
}

impl NavLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library applying `config` to its queries and future loads
    pub fn with_config(config: NavConfig) -> Self {
        Self {
            config,
            stores: Vec::new(),
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Loads `source` into a new store, appended after the existing
    /// ones. Nothing is kept when loading fails.
    pub fn add_source<S: NavSource>(&mut self, mut source: S) -> Result<LoadReport, LoadError> {
        let store = NavStore::with_config(&self.config);
        let inserted = source.load(&store).map_err(|e| {
            warn!("{}: loading failed: {}", source.name(), e);
            e
        })?;
        let report = LoadReport {
            name: source.name().to_string(),
            inserted,
            stored: store.size(),
            satellites: store.num_satellites(),
            rejected: store.rejected(),
        };
        debug!("{}: {} records loaded", report.name, report.inserted);
        self.stores.push((report.name.clone(), Arc::new(store)));
        Ok(report)
    }

    /// Appends an already populated store
    pub fn add_store(&mut self, name: &str, store: Arc<NavStore>) {
        self.stores.push((name.to_string(), store));
    }

    /// Stores, in priority order
    pub fn stores(&self) -> impl Iterator<Item = &Arc<NavStore>> {
        self.stores.iter().map(|(_, store)| store)
    }

    /// Type filter applied to future loads
    pub fn set_type_filter(&mut self, types: NavMessageTypes) {
        self.config.types = types;
    }

    pub fn set_validity_filter(&mut self, validity: NavValidityType) {
        self.config.validity = validity;
    }

    pub fn set_search_order(&mut self, order: NavSearchOrder) {
        self.config.search_order = order;
    }

    pub fn set_merge_policy(&mut self, merge: MergePolicy) {
        self.config.merge = merge;
    }

    fn find_where<F: Fn(&NavRecord) -> bool>(
        &self,
        id: &NavMessageID,
        when: Epoch,
        accept: F,
    ) -> Option<Arc<NavRecord>> {
        let mut found = self.stores.iter().filter_map(|(_, store)| {
            store.find_where(id, when, self.config.validity, self.config.search_order, &accept)
        });
        match self.config.merge {
            MergePolicy::Priority => found.next(),
            MergePolicy::MostRecent => found.fold(None, |best: Option<Arc<NavRecord>>, record| {
                match best {
                    Some(best) if best.user_time() >= record.user_time() => Some(best),
                    _ => Some(record),
                }
            }),
            MergePolicy::Unknown => None,
        }
    }

    /// Record answering `id` at `when`, per configured filter, search
    /// order and merge policy.
    pub fn find(&self, id: &NavMessageID, when: Epoch) -> Option<Arc<NavRecord>> {
        self.find_where(id, when, |_| true)
    }

    fn about(sv: SV, kind: NavMessageType) -> NavMessageID {
        NavMessageID::new(
            NavSatelliteID::pattern(WildSatID::exact(sv), NavSignalID::any()),
            kind,
        )
    }

    /// Satellite state at `when`, from its ephemeris or, when allowed
    /// and no ephemeris applies, an almanac.
    pub fn xvt(&self, sv: SV, when: Epoch, use_almanac: bool) -> Option<Xvt> {
        let from_kind = |kind| {
            let record = self.find(&Self::about(sv, kind), when)?;
            match record.xvt(when) {
                Ok(xvt) => Some(xvt),
                Err(e) => {
                    warn!("{}: {}", sv, e);
                    None
                },
            }
        };
        from_kind(NavMessageType::Ephemeris).or_else(|| {
            if use_almanac {
                from_kind(NavMessageType::Almanac)
            } else {
                None
            }
        })
    }

    /// Health of `sv` at `when`: latest health message, or the
    /// health carried by its ephemeris.
    pub fn health(&self, sv: SV, when: Epoch) -> Option<SVHealth> {
        self.find(&Self::about(sv, NavMessageType::Health), when)
            .or_else(|| self.find(&Self::about(sv, NavMessageType::Ephemeris), when))
            .and_then(|record| record.health())
    }

    /// Offset (s) to convert `when` from `from` to `to`
    pub fn time_offset(&self, from: TimeScale, to: TimeScale, when: Epoch) -> Option<f64> {
        let id = NavMessageID::new(NavSatelliteID::any(), NavMessageType::TimeOffset);
        let offset = |record: &NavRecord| record.as_time_offset()?.offset(from, to, when);
        let record = self.find_where(&id, when, |record| offset(record).is_some())?;
        offset(record.as_ref())
    }

    /// Group delay correction (s) of `sv` for a single frequency user
    /// of `signal`, which must name its carrier and code.
    pub fn isc(&self, sv: SV, signal: &NavSignalID, when: Epoch) -> Option<f64> {
        let (band, code) = (*signal.carrier.exact()?, *signal.code.exact()?);
        let correction = |record: &NavRecord| record.as_isc()?.correction(band, code);
        let record = self.find_where(&Self::about(sv, NavMessageType::ISC), when, |record| {
            correction(record).is_some()
        })?;
        correction(record.as_ref())
    }

    /// Dumps every store, in priority order
    pub fn dump<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for (name, store) in self.stores.iter() {
            writeln!(w, "# {}", name)?;
            store.dump(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn empty_library() {
        let library = NavLibrary::new();
        let t = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let id = NavMessageID::new(NavSatelliteID::any(), NavMessageType::Ephemeris);
        assert!(library.find(&id, t).is_none());
        assert!(library.time_offset(TimeScale::GPST, TimeScale::UTC, t).is_none());
    }
    #[test]
    fn failed_loads_are_dropped() {
        struct Broken;
        impl NavSource for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn load(&mut self, _: &NavStore) -> Result<usize, LoadError> {
                Err(LoadError::Source("truncated".to_string()))
            }
        }
        let mut library = NavLibrary::new();
        assert!(library.add_source(Broken).is_err());
        assert_eq!(library.stores().count(), 0);
    }
}
