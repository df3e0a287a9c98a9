//! Address - 32-byte account identity
//!
//! Every participant (lender, borrower, admin, aggregate root, value-store account)
//! is identified by an `Address`. Callers are authenticated upstream; the core only
//! compares identities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 32-byte account identifier, rendered as `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// The zero address, never a valid payment recipient
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic address from a human-readable label
    ///
    /// ```
    /// use accrue_common::Address;
    ///
    /// let a = Address::derive("alice");
    /// assert_eq!(a, Address::derive("alice"));
    /// assert_ne!(a, Address::derive("bob"));
    /// ```
    pub fn derive(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Parse a hex address, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(raw, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Shortened form for logs: `0x1a2b..9f0e`
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}..{}", &full[..4], &full[60..])
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl std::str::FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
