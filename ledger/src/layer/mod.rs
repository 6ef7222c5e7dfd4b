use anyhow::Result;
use commonware_cryptography::ed25519::PublicKey;
use muster_types::escrow::{
    EventRecord, Key, Notification, Reservation, Value, MAX_EVENT_CAPACITY, MAX_METADATA_LENGTH,
};
use std::collections::BTreeMap;

use crate::state::{balance, load_event, load_reservation, State};
use crate::EscrowError;

mod handlers;


/// Staged execution context for one batch of escrow operations.
///
/// A layer reads through to the backing store, stages every write in memory,
/// and accumulates the notifications its operations emit. Operations
/// validate fully before staging anything, so a failed operation leaves the
/// layer exactly as it was. [Layer::commit] hands the staged writes and the
/// notification stream to the caller, which applies the writes to the store.
///
/// Time is injected: `now` is the observation time for the whole batch and
/// `grace_period` is the deployment's sweep delay. Neither changes while the
/// layer lives.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Value>,
    notifications: Vec<Notification>,

    now: u64,
    grace_period: u64,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, now: u64, grace_period: u64) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
            notifications: Vec::new(),

            now,
            grace_period,
        }
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, value);
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Notifications emitted by the operations applied so far, in order.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Stages a credit to an account, failing without staging when the
    /// balance would overflow.
    async fn credit(&mut self, account: &PublicKey, amount: u64) -> Result<(), EscrowError> {
        let current = balance(self, account).await?;
        let Some(updated) = current.checked_add(amount) else {
            return Err(EscrowError::InvalidParameters {
                reason: "balance overflow",
            });
        };
        self.insert(Key::Balance(account.clone()), Value::Balance(updated));
        Ok(())
    }

    /// Stages a debit from an account, failing without staging when the
    /// balance is short.
    async fn debit(&mut self, account: &PublicKey, amount: u64) -> Result<(), EscrowError> {
        let current = balance(self, account).await?;
        if current < amount {
            return Err(EscrowError::InsufficientFunds {
                need: amount,
                have: current,
            });
        }
        self.insert(Key::Balance(account.clone()), Value::Balance(current - amount));
        Ok(())
    }

    /// Consumes the layer, returning the staged writes (in key order) and
    /// the notifications (in emission order).
    pub fn commit(self) -> (Vec<(Key, Value)>, Vec<Notification>) {
        (self.pending.into_iter().collect(), self.notifications)
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(value) => Some(value.clone()),
            None => self.state.get(key).await?,
        })
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.pending.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::create_account;
    use crate::state::Memory;
    use commonware_runtime::deterministic::Runner;
    use commonware_runtime::Runner as _;

    #[test]
    fn staged_writes_shadow_the_backing_store() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = Memory::default();
            let account = create_account(1);

            let mut layer = Layer::new(&state, 1, 0);
            layer.fund(&account, 500).await.unwrap();
            let (changes, _) = layer.commit();
            state.apply(changes).await.unwrap();
            assert_eq!(balance(&state, &account).await.unwrap(), 500);

            // A fresh layer reads through to the store, and staged writes
            // shadow it without touching it.
            let mut layer = Layer::new(&state, 2, 0);
            assert_eq!(balance(&layer, &account).await.unwrap(), 500);
            layer.fund(&account, 250).await.unwrap();
            assert_eq!(balance(&layer, &account).await.unwrap(), 750);
            assert_eq!(balance(&state, &account).await.unwrap(), 500);

            let (changes, notifications) = layer.commit();
            state.apply(changes).await.unwrap();
            assert_eq!(balance(&state, &account).await.unwrap(), 750);
            assert_eq!(notifications.len(), 1);
        });
    }

    #[test]
    fn commit_returns_notifications_in_emission_order() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = Memory::default();
            let first = create_account(1);
            let second = create_account(2);

            let mut layer = Layer::new(&state, 1, 0);
            layer.fund(&first, 10).await.unwrap();
            layer.fund(&second, 20).await.unwrap();

            let (changes, notifications) = layer.commit();
            assert_eq!(changes.len(), 2);
            assert_eq!(
                notifications,
                vec![
                    Notification::Funded {
                        account: first,
                        amount: 10
                    },
                    Notification::Funded {
                        account: second,
                        amount: 20
                    },
                ]
            );
        });
    }

    #[test]
    fn failed_operations_stage_nothing() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = Memory::default();
            let account = create_account(1);

            let mut layer = Layer::new(&state, 1, 0);
            layer.fund(&account, u64::MAX).await.unwrap();
            assert!(matches!(
                layer.fund(&account, 1).await,
                Err(EscrowError::InvalidParameters { .. })
            ));

            assert_eq!(balance(&layer, &account).await.unwrap(), u64::MAX);
            assert_eq!(layer.notifications().len(), 1);
        });
    }
}
