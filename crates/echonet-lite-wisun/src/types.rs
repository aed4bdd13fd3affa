//! Wi-SUN-side value types (§3 `PanDesc`).

/// PAN descriptor returned by active scan (§4.D, §9 GLOSSARY "PAN Desc").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanDesc {
    pub channel: String,
    pub pan_id: String,
    pub mac_addr: String,
    /// Filled in after `SKLL64` resolves `mac_addr` to a link-local address.
    pub ipv6_addr: String,
}

/// How the modem encodes `ERXUDP`'s trailing data token (§4.D, §9 "Variant
/// differences"). Selected once per deployment, never per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErxudpVariant {
    HexAscii,
    Binary,
}

impl ErxudpVariant {
    /// §9's recommended heuristic: if the token's length is exactly twice
    /// the declared byte length, it's hex-ASCII; otherwise binary.
    pub fn detect(datalen: usize, token: &[u8]) -> Self {
        if token.len() == datalen * 2 {
            ErxudpVariant::HexAscii
        } else {
            ErxudpVariant::Binary
        }
    }
}
