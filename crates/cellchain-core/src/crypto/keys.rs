use rand::RngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_big_array::BigArray;
use std::fmt;
use std::str::FromStr;

use crate::crypto::hash::{hash_blake3, hash_parts};
use crate::error::CoreError;

/// Byte length of a compressed secp256k1 public key
pub const PUBKEY_LEN: usize = 33;

/// Byte length of an account address
pub const ADDRESS_LEN: usize = 20;

fn decode_prefixed_hex(s: &str) -> Result<Vec<u8>, CoreError> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(body)?)
}

/// Compressed validator public key (33 bytes).
///
/// Ordering is plain lexicographic byte order, which is what the validator
/// ranking uses to break ties.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PubKey(pub [u8; PUBKEY_LEN]);

impl PubKey {
    pub fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; PUBKEY_LEN] = slice.try_into().ok()?;
        Some(PubKey(bytes))
    }

    /// Parse a key from hex, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = decode_prefixed_hex(s)?;
        Self::from_slice(&bytes).ok_or_else(|| {
            CoreError::InvalidPublicKey(format!("expected {} bytes, got {}", PUBKEY_LEN, bytes.len()))
        })
    }

    /// `0x`-prefixed hex encoding
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Address controlled by the holder of this key.
    pub fn address(&self) -> Address {
        let hash = hash_blake3(&self.0);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..ADDRESS_LEN]);
        Address(bytes)
    }

    /// Generate a random key with a valid compressed-point prefix byte.
    /// Only the byte layout is meaningful; no curve arithmetic is involved.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; PUBKEY_LEN];
        rng.fill_bytes(&mut bytes[1..]);
        bytes[0] = if rng.next_u32() % 2 == 0 { 0x02 } else { 0x03 };
        PubKey(bytes)
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({})", self.to_hex())
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for PubKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            BigArray::serialize(&self.0, serializer)
        }
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            PubKey::from_hex(&s).map_err(D::Error::custom)
        } else {
            let bytes = <[u8; PUBKEY_LEN] as BigArray<'de, u8>>::deserialize(deserializer)?;
            Ok(PubKey(bytes))
        }
    }
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_LEN] = slice.try_into().ok()?;
        Some(Address(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = decode_prefixed_hex(s)?;
        Self::from_slice(&bytes).ok_or_else(|| {
            CoreError::InvalidAddress(format!("expected {} bytes, got {}", ADDRESS_LEN, bytes.len()))
        })
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Deterministic address for a genesis contract, derived from its label.
    pub fn for_contract(label: &str) -> Self {
        let hash = hash_parts(&[b"contract:", label.as_bytes()]);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..ADDRESS_LEN]);
        Address(bytes)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Address(bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            Serialize::serialize(&self.0, serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_hex(&s).map_err(D::Error::custom)
        } else {
            Ok(Address(<[u8; ADDRESS_LEN] as Deserialize>::deserialize(deserializer)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_hex_roundtrip() {
        let key = PubKey::random();
        let hex_str = key.to_hex();
        assert!(hex_str.starts_with("0x"));
        assert_eq!(hex_str.len(), 2 + 2 * PUBKEY_LEN);
        assert_eq!(PubKey::from_hex(&hex_str).unwrap(), key);
        // the prefix is optional on input
        assert_eq!(PubKey::from_hex(&hex_str[2..]).unwrap(), key);
    }

    #[test]
    fn test_pubkey_wrong_length() {
        let err = PubKey::from_hex("0x0102").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPublicKey(_)));
    }

    #[test]
    fn test_random_pubkey_prefix() {
        for _ in 0..16 {
            let key = PubKey::random();
            assert!(key.0[0] == 0x02 || key.0[0] == 0x03);
        }
    }

    #[test]
    fn test_address_derivation_is_stable() {
        let key = PubKey([5u8; PUBKEY_LEN]);
        assert_eq!(key.address(), key.address());
        assert_ne!(key.address(), PubKey([6u8; PUBKEY_LEN]).address());
    }

    #[test]
    fn test_contract_addresses_distinct() {
        assert_ne!(Address::for_contract("system"), Address::for_contract("energy"));
        assert_eq!(Address::for_contract("system"), Address::for_contract("system"));
    }

    #[test]
    fn test_pubkey_order_is_bytewise() {
        let mut low = [0u8; PUBKEY_LEN];
        let mut high = [0u8; PUBKEY_LEN];
        low[32] = 1;
        high[0] = 1;
        assert!(PubKey(low) < PubKey(high));
    }

    #[test]
    fn test_keys_serialize_as_hex_and_raw_bytes() {
        let key = PubKey::random();
        let address = key.address();

        let json = serde_json::to_string(&(key, address)).unwrap();
        assert!(json.contains(&address.to_hex()));
        let decoded: (PubKey, Address) = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, (key, address));

        let bytes = bincode::serialize(&(key, address)).unwrap();
        assert_eq!(bytes.len(), PUBKEY_LEN + ADDRESS_LEN);
        let decoded: (PubKey, Address) = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, (key, address));
    }
}
