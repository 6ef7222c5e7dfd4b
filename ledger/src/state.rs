use anyhow::Result;
use commonware_cryptography::ed25519::PublicKey;
use muster_types::escrow::{EventRecord, Key, Reservation, Value};
use std::future::Future;

#[cfg(any(test, feature = "mocks"))]
use std::collections::HashMap;

/// Backing store for ledger state.
///
/// The store is owned by the caller and passed to each [crate::Layer] by
/// reference; nothing in this crate holds global state. Writes staged by a
/// layer reach the store through [State::apply].
pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = Result<()>>;

    fn apply(&mut self, changes: Vec<(Key, Value)>) -> impl Future<Output = Result<()>> {
        async {
            for (key, value) in changes {
                self.insert(key, value).await?;
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "mocks"))]
#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

#[cfg(any(test, feature = "mocks"))]
impl State for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.state.insert(key, value);
        Ok(())
    }
}

/// Spendable balance of an account, zero when never funded.
pub async fn balance<S: State>(state: &S, account: &PublicKey) -> Result<u64> {
    Ok(match state.get(&Key::Balance(account.clone())).await? {
        Some(Value::Balance(balance)) => balance,
        _ => 0,
    })
}

/// Escrow record of an event, if the event exists.
pub async fn load_event<S: State>(state: &S, event: u64) -> Result<Option<EventRecord>> {
    Ok(match state.get(&Key::Event(event)).await? {
        Some(Value::Event(record)) => Some(record),
        _ => None,
    })
}

/// A participant's reservation against an event, if one was ever accepted.
pub async fn load_reservation<S: State>(
    state: &S,
    event: u64,
    participant: &PublicKey,
) -> Result<Option<Reservation>> {
    Ok(
        match state
            .get(&Key::Reservation(event, participant.clone()))
            .await?
        {
            Some(Value::Reservation(reservation)) => Some(reservation),
            _ => None,
        },
    )
}
