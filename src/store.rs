//! Time indexed navigation record store
use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use itertools::Itertools;
use log::{debug, error, warn};
use thiserror::Error;

use crate::{
    config::{NavConfig, UniquenessPolicy},
    identity::{NavMessageID, NavMessageType, NavMessageTypes, NavSatelliteID, NavSignalID, WildSatID},
    navigation::{NavRecord, NavSearchOrder, NavValidityType},
    prelude::{Epoch, SV},
};

/// Insertion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("record failed validation")]
    Validation,
    #[error("conflicting record already stored")]
    DuplicateConflict,
    #[error("record kind filtered out")]
    Filtered,
}

/// Records of one satellite, signal and kind, keyed by user time
pub type Ledger = BTreeMap<Epoch, Arc<NavRecord>>;

type Bucket = Arc<RwLock<Ledger>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        error!("store: recovering from poisoned lock");
        poisoned.into_inner()
    })
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        error!("store: recovering from poisoned lock");
        poisoned.into_inner()
    })
}

/// [NavStore] holds decoded [NavRecord]s, one [Ledger] per message
/// kind and [NavSatelliteID]. Ledgers are locked individually: the
/// outer map is only write locked when a ledger is created.
#[derive(Debug, Default)]
pub struct NavStore {
    config: NavConfig,
    buckets: RwLock<BTreeMap<NavMessageType, BTreeMap<NavSatelliteID, Bucket>>>,
    rejected: AtomicUsize,
}

impl NavStore {
    /// Empty store with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store applying the insertion settings of `config`
    pub fn with_config(config: &NavConfig) -> Self {
        Self {
            config: *config,
            buckets: Default::default(),
            rejected: AtomicUsize::new(0),
        }
    }

    /// Kinds of records this store accepts
    pub fn type_filter(&self) -> NavMessageTypes {
        self.config.types
    }

    /// Runs `f` on the ledger of `id`, created when missing.
    /// The outer map stays locked meanwhile, so [NavStore::clear] and
    /// edition cannot detach the ledger being written.
    fn with_ledger<R, F: FnOnce(&mut Ledger) -> R>(&self, id: &NavMessageID, f: F) -> R {
        {
            let buckets = read(&self.buckets);
            if let Some(bucket) = buckets.get(&id.kind).and_then(|sats| sats.get(&id.sat)) {
                let mut ledger = write(bucket);
                return f(&mut ledger);
            }
        }
        let mut buckets = write(&self.buckets);
        let bucket = buckets
            .entry(id.kind)
            .or_default()
            .entry(id.sat)
            .or_default();
        let mut ledger = write(bucket);
        f(&mut ledger)
    }

    /// Buckets of `kind` whose identity matches `sat`
    fn matching(&self, kind: NavMessageType, sat: &NavSatelliteID) -> Vec<Bucket> {
        read(&self.buckets)
            .get(&kind)
            .map(|sats| {
                sats.iter()
                    .filter(|(id, _)| sat.matches(id))
                    .map(|(_, bucket)| bucket.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all_buckets(&self) -> Vec<(NavMessageID, Bucket)> {
        read(&self.buckets)
            .iter()
            .flat_map(|(kind, sats)| {
                sats.iter()
                    .map(move |(sat, bucket)| (NavMessageID::new(*sat, *kind), bucket.clone()))
            })
            .collect()
    }

    /// Inserts a record. Returns true when the store changed, false
    /// when an identical (or, per policy, any) record was already
    /// stored under the same key and user time.
    pub fn insert(&self, record: NavRecord) -> Result<bool, StoreError> {
        if !self.config.types.retains(record.kind()) {
            return Err(StoreError::Filtered);
        }
        if !self.config.store_validity.accepts(record.validate()) {
            warn!("store: rejecting invalid {}", record);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Validation);
        }
        let user = record.user_time();
        let uniqueness = self.config.uniqueness;
        let id = record.id;
        self.with_ledger(&id, |ledger| {
            if let Some(stored) = ledger.get(&user) {
                if **stored == record {
                    return Ok(false);
                }
                return match uniqueness {
                    UniquenessPolicy::Reject => {
                        warn!("store: conflicting {}", record);
                        Err(StoreError::DuplicateConflict)
                    },
                    UniquenessPolicy::Overwrite => {
                        debug!("store: overwriting {}", record);
                        ledger.insert(user, Arc::new(record));
                        Ok(true)
                    },
                    UniquenessPolicy::KeepFirst | UniquenessPolicy::Unknown => Ok(false),
                };
            }
            debug!("store: {}", record);
            ledger.insert(user, Arc::new(record));
            Ok(true)
        })
    }

    /// Finds the record answering `id` at `when`.
    /// Wildcards in `id` select every matching ledger.
    pub fn find(
        &self,
        id: &NavMessageID,
        when: Epoch,
        validity: NavValidityType,
        order: NavSearchOrder,
    ) -> Option<Arc<NavRecord>> {
        self.find_where(id, when, validity, order, |_| true)
    }

    /// [NavStore::find] restricted to records satisfying `accept`
    pub fn find_where<F: Fn(&NavRecord) -> bool>(
        &self,
        id: &NavMessageID,
        when: Epoch,
        validity: NavValidityType,
        order: NavSearchOrder,
        accept: F,
    ) -> Option<Arc<NavRecord>> {
        let usable = |record: &Arc<NavRecord>| validity.accepts(record.validate()) && accept(record);
        let mut best: Option<(Epoch, Arc<NavRecord>)> = None;
        for bucket in self.matching(id.kind, &id.sat) {
            let ledger = read(&bucket);
            let candidate = match order {
                NavSearchOrder::User => ledger.range(..=when).rev().find(|(_, r)| usable(r)),
                NavSearchOrder::Nearest => ledger
                    .iter()
                    .rev()
                    .find(|(_, r)| r.is_fit(when) && usable(r)),
                NavSearchOrder::Unknown => None,
            };
            if let Some((user, record)) = candidate {
                if best.as_ref().map(|(t, _)| user > t).unwrap_or(true) {
                    best = Some((*user, record.clone()));
                }
            }
        }
        best.map(|(_, record)| record)
    }

    /// Erases the records whose user time lies in `[from, to)`
    /// and satisfy `select`. Emptied ledgers are dropped.
    fn erase<F: Fn(&NavSatelliteID) -> bool>(&self, from: Epoch, to: Epoch, select: F) -> usize {
        let mut erased = 0;
        let mut buckets = write(&self.buckets);
        for sats in buckets.values_mut() {
            sats.retain(|sat, bucket| {
                if !select(sat) {
                    return true;
                }
                let mut ledger = write(bucket);
                let before = ledger.len();
                ledger.retain(|t, _| *t < from || *t >= to);
                erased += before - ledger.len();
                !ledger.is_empty()
            });
        }
        buckets.retain(|_, sats| !sats.is_empty());
        debug!("store: erased {} records", erased);
        erased
    }

    /// Erases every record with user time in `[from, to)`
    pub fn edit(&self, from: Epoch, to: Epoch) -> usize {
        self.erase(from, to, |_| true)
    }

    /// Erases the records about `sv` with user time in `[from, to)`
    pub fn edit_sat(&self, sv: SV, from: Epoch, to: Epoch) -> usize {
        let pattern = WildSatID::exact(sv);
        self.erase(from, to, |sat| pattern.matches(&sat.sat))
    }

    /// Erases the records broadcast on `signal` (may be a pattern),
    /// with user time in `[from, to)`
    pub fn edit_signal(&self, signal: &NavSignalID, from: Epoch, to: Epoch) -> usize {
        self.erase(from, to, |sat| signal.matches(&sat.signal))
    }

    /// Drops every record
    pub fn clear(&self) {
        write(&self.buckets).clear();
    }

    /// Number of records stored
    pub fn size(&self) -> usize {
        self.all_buckets()
            .iter()
            .map(|(_, bucket)| read(bucket).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Records refused so far for failing validation
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Non empty ledger identities
    fn populated(&self) -> Vec<NavMessageID> {
        self.all_buckets()
            .into_iter()
            .filter(|(_, bucket)| !read(bucket).is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of distinct signals records were broadcast on
    pub fn num_signals(&self) -> usize {
        self.populated().iter().map(|id| id.sat.signal).unique().count()
    }

    /// Number of distinct satellites records are about
    pub fn num_satellites(&self) -> usize {
        self.available_sats().len()
    }

    /// Satellites records are about
    pub fn available_sats(&self) -> BTreeSet<SV> {
        self.populated()
            .iter()
            .filter_map(|id| id.sat.sat.sv())
            .collect()
    }

    /// Earliest user time
    pub fn first_time(&self) -> Option<Epoch> {
        self.all_buckets()
            .iter()
            .filter_map(|(_, bucket)| read(bucket).keys().next().copied())
            .min()
    }

    /// Latest user time
    pub fn last_time(&self) -> Option<Epoch> {
        self.all_buckets()
            .iter()
            .filter_map(|(_, bucket)| read(bucket).keys().next_back().copied())
            .max()
    }

    /// Writes one line per record, sorted by user time
    pub fn dump<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        let records = self
            .all_buckets()
            .iter()
            .flat_map(|(_, bucket)| read(bucket).values().cloned().collect::<Vec<_>>())
            .sorted_by(|a, b| a.user_time().cmp(&b.user_time()))
            .collect::<Vec<_>>();
        for record in records {
            writeln!(w, "{}", record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        navigation::{GpsLnavHealth, Health, LnavHeader, NavData},
        prelude::{Constellation, Duration, TimeScale},
    };

    fn health(prn: u8, t: Epoch, bits: u8) -> NavRecord {
        NavRecord::new(
            NavSatelliteID::own(SV::new(Constellation::GPS, prn), NavSignalID::gps_lnav()),
            t,
            NavData::Health(Health::GpsLnav(GpsLnavHealth {
                header: LnavHeader {
                    preamble: 0x8b,
                    subframe: 1,
                    ..Default::default()
                },
                bits,
            })),
        )
    }

    #[test]
    fn idempotent_insert() {
        let store = NavStore::new();
        let t = Epoch::from_gregorian_at_midnight(2024, 3, 1, TimeScale::GPST);
        assert_eq!(store.insert(health(1, t, 0)), Ok(true));
        assert_eq!(store.insert(health(1, t, 0)), Ok(false));
        assert_eq!(store.size(), 1);
        // keep first
        assert_eq!(store.insert(health(1, t, 1)), Ok(false));
        let id = NavMessageID::new(NavSatelliteID::any(), NavMessageType::Health);
        let found = store
            .find(&id, t + Duration::from_seconds(6.0), NavValidityType::ValidOnly, NavSearchOrder::User)
            .unwrap();
        assert_eq!(*found, health(1, t, 0));
    }

    #[test]
    fn uniqueness_policies() {
        let t = Epoch::from_gregorian_at_midnight(2024, 3, 1, TimeScale::GPST);
        let reject = NavStore::with_config(&NavConfig::default().with_uniqueness(UniquenessPolicy::Reject));
        assert_eq!(reject.insert(health(1, t, 0)), Ok(true));
        assert_eq!(reject.insert(health(1, t, 1)), Err(StoreError::DuplicateConflict));
        let overwrite =
            NavStore::with_config(&NavConfig::default().with_uniqueness(UniquenessPolicy::Overwrite));
        assert_eq!(overwrite.insert(health(1, t, 0)), Ok(true));
        assert_eq!(overwrite.insert(health(1, t, 1)), Ok(true));
        assert_eq!(overwrite.size(), 1);
    }

    #[test]
    fn filters() {
        let t = Epoch::from_gregorian_at_midnight(2024, 3, 1, TimeScale::GPST);
        let store = NavStore::with_config(&NavConfig::default().with_types(NavMessageTypes::EPHEMERIS));
        assert_eq!(store.insert(health(1, t, 0)), Err(StoreError::Filtered));
        let mut invalid = health(1, t, 0);
        if let NavData::Health(Health::GpsLnav(h)) = &mut invalid.data {
            h.header.preamble = 0x8c;
        }
        let store = NavStore::new();
        assert_eq!(store.insert(invalid.clone()), Err(StoreError::Validation));
        assert_eq!(store.rejected(), 1);
        assert!(store.is_empty());
        let store = NavStore::with_config(&NavConfig::default().with_store_validity(NavValidityType::Any));
        assert_eq!(store.insert(invalid), Ok(true));
    }

    #[test]
    fn edition_drops_empty_ledgers() {
        let store = NavStore::new();
        let t = Epoch::from_gregorian_at_midnight(2024, 3, 1, TimeScale::GPST);
        for prn in 1..=3 {
            store.insert(health(prn, t, 0)).unwrap();
        }
        store.insert(health(1, t + Duration::from_seconds(60.0), 0)).unwrap();
        assert_eq!(store.all_buckets().len(), 3);
        let erased = store.edit(t, t + Duration::from_seconds(30.0));
        assert_eq!(erased, 3);
        assert_eq!(store.all_buckets().len(), 1);
        assert_eq!(store.edit(t, t + Duration::from_seconds(120.0)), 1);
        assert!(store.all_buckets().is_empty());
        assert!(read(&store.buckets).is_empty());
    }

    #[test]
    fn concurrent_inserts_and_clears() {
        let store = Arc::new(NavStore::new());
        let t = Epoch::from_gregorian_at_midnight(2024, 3, 1, TimeScale::GPST);
        let writers = (1..=4_u8)
            .map(|prn| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let t = t + Duration::from_seconds(6.0 * i as f64);
                        store.insert(health(prn, t, 0)).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for _ in 0..10 {
            store.clear();
        }
        for writer in writers {
            writer.join().unwrap();
        }
        // no write went to a detached ledger
        store.clear();
        for prn in 1..=4_u8 {
            store.insert(health(prn, t, 0)).unwrap();
        }
        assert_eq!(store.size(), 4);
        assert_eq!(store.num_satellites(), 4);
    }
}
