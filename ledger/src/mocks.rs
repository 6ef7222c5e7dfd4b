//! Deterministic helpers for tests and demo drivers.

use commonware_cryptography::{ed25519::PrivateKey, ed25519::PublicKey, Signer};

/// Derives a deterministic ed25519 identity from the provided seed.
///
/// The ledger never verifies signatures; identities are compared for
/// equality only, so tests and demos need just the public half.
pub fn create_account(seed: u64) -> PublicKey {
    PrivateKey::from_seed(seed).public_key()
}
