// Opaque identifier services: batch ids, lot numbers, confirmation tokens.

use rand::Rng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque unique batch identifier, assigned at creation and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for BatchId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Human-readable lot code, e.g. "LOT-48213".
pub fn generate_lot_number() -> String {
    let mut rng = rand::rng();
    format!("LOT-{:05}", rng.random_range(0..100_000u32))
}

/// Single-use secret guarding a pending order confirmation: "0x" + 64 hex chars.
pub fn generate_confirmation_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let mut token = String::with_capacity(2 + bytes.len() * 2);
    token.push_str("0x");
    for byte in bytes {
        token.push_str(&format!("{byte:02x}"));
    }
    token
}

/// Where the QR asset for a lot is served from. Image generation is not this
/// crate's concern; the pointer is recorded on the batch at registration.
pub fn qr_asset_path(lot_number: &str) -> String {
    format!("/qr/{}.svg", lot_number.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_numbers_carry_the_prefix() {
        let lot = generate_lot_number();
        assert!(lot.starts_with("LOT-"));
        assert_eq!(lot.len(), "LOT-".len() + 5);
    }

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = generate_confirmation_token();
        let b = generate_confirmation_token();
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);
        assert!(a[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn qr_paths_are_lowercased() {
        assert_eq!(qr_asset_path("LOT-00042"), "/qr/lot-00042.svg");
    }
}
