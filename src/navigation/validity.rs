//! Validity filters, search orders and fit intervals
use std::{convert::Infallible, str::FromStr};

use hifitime::Epoch;
use strum_macros::EnumIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Selects records by their `validate()` outcome
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NavValidityType {
    Unknown,
    /// Only records that passed validation
    #[default]
    ValidOnly,
    /// Only records that failed validation
    InvalidOnly,
    /// Any record
    Any,
}

impl NavValidityType {
    /// True if a record with this validation outcome is retained
    pub fn accepts(&self, valid: bool) -> bool {
        match self {
            Self::ValidOnly => valid,
            Self::InvalidOnly => !valid,
            Self::Any => true,
            Self::Unknown => false,
        }
    }
}

impl std::fmt::Display for NavValidityType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::ValidOnly => write!(f, "ValidOnly"),
            Self::InvalidOnly => write!(f, "InvalidOnly"),
            Self::Any => write!(f, "Any"),
        }
    }
}

impl FromStr for NavValidityType {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "validonly" => Self::ValidOnly,
            "invalidonly" => Self::InvalidOnly,
            "any" => Self::Any,
            _ => Self::Unknown,
        })
    }
}

/// How a query picks among candidate records
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NavSearchOrder {
    Unknown,
    /// Latest record a receiver would have known at the query time
    /// (greatest user time not after the query time)
    #[default]
    User,
    /// Latest record whose fit interval contains the query time
    Nearest,
}

impl std::fmt::Display for NavSearchOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::User => write!(f, "User"),
            Self::Nearest => write!(f, "Nearest"),
        }
    }
}

impl FromStr for NavSearchOrder {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "user" => Self::User,
            "nearest" => Self::Nearest,
            _ => Self::Unknown,
        })
    }
}

/// Fit interval `[begin, end)`. No `end` means open ended.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidityInterval {
    /// Start of validity, included
    pub begin: Epoch,
    /// End of validity, excluded
    pub end: Option<Epoch>,
}

impl ValidityInterval {
    pub fn new(begin: Epoch, end: Epoch) -> Self {
        Self {
            begin,
            end: Some(end),
        }
    }
    /// Interval that never ends
    pub fn from(begin: Epoch) -> Self {
        Self { begin, end: None }
    }
    /// True when `t` lies in `[begin, end)`
    pub fn contains(&self, t: Epoch) -> bool {
        t >= self.begin && self.end.map(|end| t < end).unwrap_or(true)
    }
}

impl std::fmt::Display for ValidityInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.begin, end),
            None => write!(f, "[{}, ...)", self.begin),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hifitime::Duration;
    use strum::IntoEnumIterator;
    #[test]
    fn validity_strings() {
        for v in NavValidityType::iter() {
            let s = v.to_string();
            assert_eq!(NavValidityType::from_str(&s).unwrap(), v);
            if v != NavValidityType::Unknown {
                assert_ne!(s, "Unknown");
            }
        }
        assert_eq!(
            NavValidityType::from_str("nope").unwrap(),
            NavValidityType::Unknown
        );
    }
    #[test]
    fn search_order_strings() {
        for v in NavSearchOrder::iter() {
            let s = v.to_string();
            assert_eq!(NavSearchOrder::from_str(&s).unwrap(), v);
            if v != NavSearchOrder::Unknown {
                assert_ne!(s, "Unknown");
            }
        }
    }
    #[test]
    fn validity_filter() {
        assert!(NavValidityType::ValidOnly.accepts(true));
        assert!(!NavValidityType::ValidOnly.accepts(false));
        assert!(NavValidityType::InvalidOnly.accepts(false));
        assert!(!NavValidityType::InvalidOnly.accepts(true));
        assert!(NavValidityType::Any.accepts(false));
        assert!(!NavValidityType::Unknown.accepts(true));
    }
    #[test]
    fn interval() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let t1 = t0 + Duration::from_seconds(3600.0);
        let fit = ValidityInterval::new(t0, t1);
        assert!(fit.contains(t0));
        assert!(!fit.contains(t1));
        assert!(!fit.contains(t0 - Duration::from_seconds(1.0)));
        let open = ValidityInterval::from(t0);
        assert!(open.contains(t1 + Duration::from_seconds(1.0E9)));
    }
}
