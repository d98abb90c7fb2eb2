//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MacAddr([u8; 6]);

/// Error type for MAC address parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseMacAddrError;

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

// Netlink hands hardware addresses over as plain byte vectors.
impl TryFrom<&[u8]> for MacAddr {
    type Error = ParseMacAddrError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| ParseMacAddrError)?;
        Ok(MacAddr(bytes))
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

impl FromStr for MacAddr {
    type Err = ParseMacAddrError;

    /// Parse a MAC address from a string.
    ///
    /// Accepts colon-separated ("aa:bb:cc:dd:ee:ff") and hyphen-separated
    /// ("aa-bb-cc-dd-ee-ff") notations.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains(':') { ':' } else { '-' };
        let mut bytes = [0u8; 6];
        let mut parts = s.split(sep);
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or(ParseMacAddrError)?;
            if part.len() != 2 {
                return Err(ParseMacAddrError);
            }
            *byte =
                u8::from_str_radix(part, 16).map_err(|_| ParseMacAddrError)?;
        }
        if parts.next().is_some() {
            return Err(ParseMacAddrError);
        }

        Ok(MacAddr(bytes))
    }
}

// ===== impl ParseMacAddrError =====

impl std::fmt::Display for ParseMacAddrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid MAC address format")
    }
}

impl std::error::Error for ParseMacAddrError {}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_notations() {
        let expected = MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!("02:00:00:00:00:01".parse::<MacAddr>(), Ok(expected));
        assert_eq!("02-00-00-00-00-01".parse::<MacAddr>(), Ok(expected));
        assert_eq!(expected.to_string(), "02:00:00:00:00:01");
    }

    #[test]
    fn parse_malformed() {
        for input in [
            "",
            "02:00:00:00:00",
            "02:00:00:00:00:01:ff",
            "zz:00:00:00:00:01",
            "2:00:00:00:00:01",
        ] {
            assert_eq!(input.parse::<MacAddr>(), Err(ParseMacAddrError));
        }
    }

    #[test]
    fn from_netlink_bytes() {
        let bytes = vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let mac = MacAddr::try_from(bytes.as_slice()).unwrap();
        assert_eq!(mac.as_bytes(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert!(MacAddr::try_from(&bytes[..4]).is_err());
    }
}
