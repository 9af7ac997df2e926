//! Store and library settings
use std::{convert::Infallible, str::FromStr};

use strum_macros::EnumIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    identity::NavMessageTypes,
    navigation::{NavSearchOrder, NavValidityType},
};

/// What the store does with a record whose key and user time are
/// already stored with a different content.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UniquenessPolicy {
    Unknown,
    /// Refuse the new record
    Reject,
    /// Replace the stored record
    Overwrite,
    /// Keep the stored record, drop the new one silently
    #[default]
    KeepFirst,
}

impl std::fmt::Display for UniquenessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Reject => write!(f, "Reject"),
            Self::Overwrite => write!(f, "Overwrite"),
            Self::KeepFirst => write!(f, "KeepFirst"),
        }
    }
}

impl FromStr for UniquenessPolicy {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "reject" => Self::Reject,
            "overwrite" => Self::Overwrite,
            "keepfirst" => Self::KeepFirst,
            _ => Self::Unknown,
        })
    }
}

/// How the library combines the answers of several stores
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MergePolicy {
    Unknown,
    /// First store (in registration order) holding a match
    #[default]
    Priority,
    /// Match with the greatest user time, across stores
    MostRecent,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Priority => write!(f, "Priority"),
            Self::MostRecent => write!(f, "MostRecent"),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "priority" => Self::Priority,
            "mostrecent" => Self::MostRecent,
            _ => Self::Unknown,
        })
    }
}

/// [NavConfig] gathers the settings of stores and libraries.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NavConfig {
    /// Duplicate handling on insertion
    pub uniqueness: UniquenessPolicy,
    /// Records the store accepts, per validation outcome
    pub store_validity: NavValidityType,
    /// Kinds of records loaded
    pub types: NavMessageTypes,
    /// Query search order
    pub search_order: NavSearchOrder,
    /// Query validity filter
    pub validity: NavValidityType,
    /// Multi store merge
    pub merge: MergePolicy,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            uniqueness: UniquenessPolicy::default(),
            store_validity: NavValidityType::ValidOnly,
            types: NavMessageTypes::all(),
            search_order: NavSearchOrder::default(),
            validity: NavValidityType::ValidOnly,
            merge: MergePolicy::default(),
        }
    }
}

impl NavConfig {
    /// Copies and returns [NavConfig] with desired [UniquenessPolicy]
    pub fn with_uniqueness(&self, uniqueness: UniquenessPolicy) -> Self {
        let mut s = *self;
        s.uniqueness = uniqueness;
        s
    }
    /// Copies and returns [NavConfig] accepting records per `validity`
    /// in the store.
    pub fn with_store_validity(&self, validity: NavValidityType) -> Self {
        let mut s = *self;
        s.store_validity = validity;
        s
    }
    /// Copies and returns [NavConfig] with desired type filter
    pub fn with_types(&self, types: NavMessageTypes) -> Self {
        let mut s = *self;
        s.types = types;
        s
    }
    pub fn with_search_order(&self, order: NavSearchOrder) -> Self {
        let mut s = *self;
        s.search_order = order;
        s
    }
    pub fn with_validity(&self, validity: NavValidityType) -> Self {
        let mut s = *self;
        s.validity = validity;
        s
    }
    pub fn with_merge(&self, merge: MergePolicy) -> Self {
        let mut s = *self;
        s.merge = merge;
        s
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;
    #[test]
    fn policy_strings() {
        for policy in UniquenessPolicy::iter() {
            let s = policy.to_string();
            assert_eq!(UniquenessPolicy::from_str(&s).unwrap(), policy);
        }
        for policy in MergePolicy::iter() {
            let s = policy.to_string();
            assert_eq!(MergePolicy::from_str(&s).unwrap(), policy);
        }
        assert_eq!(
            UniquenessPolicy::from_str("first").unwrap(),
            UniquenessPolicy::Unknown
        );
    }
    #[test]
    fn builder() {
        let cfg = NavConfig::default()
            .with_uniqueness(UniquenessPolicy::Reject)
            .with_merge(MergePolicy::MostRecent)
            .with_store_validity(NavValidityType::Any)
            .with_validity(NavValidityType::Any);
        assert_eq!(cfg.validity, NavValidityType::Any);
        assert_eq!(cfg.uniqueness, UniquenessPolicy::Reject);
        assert_eq!(cfg.merge, MergePolicy::MostRecent);
        assert_eq!(cfg.store_validity, NavValidityType::Any);
        assert_eq!(cfg.search_order, NavSearchOrder::User);
        assert_eq!(cfg.types, NavMessageTypes::all());
    }
    #[cfg(feature = "serde")]
    #[test]
    fn serdes() {
        let cfg = NavConfig::default().with_search_order(NavSearchOrder::Nearest);
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: NavConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cfg);
    }
}
