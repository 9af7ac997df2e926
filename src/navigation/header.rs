//! Transmission unit headers, kept on the records for validation
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// GPS LNAV TLM and HOW words
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LnavHeader {
    /// 8 bit preamble
    pub preamble: u8,
    /// TLM message
    pub tlm: u16,
    /// Truncated time of week count, times 6 is the second of week
    /// at the start of the next subframe
    pub tow_count: u32,
    /// Alert flag
    pub alert: bool,
    /// Anti spoofing flag
    pub anti_spoofing: bool,
    /// Subframe identifier
    pub subframe: u8,
}

impl LnavHeader {
    /// Expected preamble value
    pub const PREAMBLE: u8 = 0x8b;

    /// A zeroed preamble is tolerated, for headers rebuilt from
    /// archival formats that do not carry it.
    pub fn validate(&self) -> bool {
        self.preamble == 0 || self.preamble == Self::PREAMBLE
    }
}

/// GPS CNAV message header
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CnavHeader {
    /// 8 bit preamble
    pub preamble: u8,
    /// Message type
    pub msg_type: u8,
    /// Truncated time of week count of the next message
    pub tow_count: u32,
    /// Alert flag
    pub alert: bool,
}

impl CnavHeader {
    /// Expected preamble value
    pub const PREAMBLE: u8 = 0x8b;

    pub fn validate(&self) -> bool {
        self.preamble == 0 || self.preamble == Self::PREAMBLE
    }
}

/// BeiDou D1 subframe header
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdsHeader {
    /// 11 bit preamble
    pub preamble: u16,
    /// Revision
    pub rev: u8,
    /// Subframe identifier
    pub fraid: u8,
    /// Second of week (BDT)
    pub sow: u32,
}

impl BdsHeader {
    /// Expected preamble value
    pub const PREAMBLE: u16 = 0x712;

    pub fn validate(&self) -> bool {
        self.preamble == 0 || self.preamble == Self::PREAMBLE
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn preambles() {
        let mut lnav = LnavHeader::default();
        assert!(lnav.validate());
        lnav.preamble = 0x8b;
        assert!(lnav.validate());
        lnav.preamble = 0x8c;
        assert!(!lnav.validate());
        let mut bds = BdsHeader::default();
        bds.preamble = 0x712;
        assert!(bds.validate());
        bds.preamble = 0x713;
        assert!(!bds.validate());
    }
}
