//! Read-side views over the muster escrow ledger.
//!
//! The ledger announces every applied operation as a
//! [Notification](muster_types::escrow::Notification). An [Indexer] folds
//! that stream into per-event and per-account views that mirror the ledger
//! state exactly, so a consumer holding only the notification stream can
//! answer the same questions the store can.

use commonware_codec::Encode;
use commonware_cryptography::ed25519::PublicKey;
use commonware_utils::hex;
use muster_types::escrow::Notification;
use serde::Serialize;
use std::collections::BTreeMap;

/// Hex rendering of an account key, as it appears in views.
pub fn account_hex(account: &PublicKey) -> String {
    hex(&account.encode())
}

/// One reservation as seen by the indexer. `participant` is the account's
/// hex rendering.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ReservationView {
    pub participant: String,
    pub confirmed: bool,
    pub refunded: bool,
}

/// One event as seen by the indexer. `reservations` is ordered by
/// acceptance, matching the ledger's attendee list.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct EventView {
    pub event: u64,
    pub organizer: String,
    pub scheduled_at: u64,
    pub deposit_amount: u64,
    pub max_capacity: u32,
    pub metadata: String,
    pub reservations: Vec<ReservationView>,
    pub confirmed_count: u32,
    pub total_held: u64,
    pub settled: bool,
    pub swept_amount: Option<u64>,
}

/// Snapshot of everything the indexer knows.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerView {
    pub events: Vec<EventView>,
    pub balances: BTreeMap<String, u64>,
}

/// Folds the ledger's notification stream into queryable views.
///
/// Feeding the complete stream, in order, rebuilds the same views as
/// feeding it commit by commit. Notifications that reference an event the
/// indexer has not seen are dropped.
#[derive(Default)]
pub struct Indexer {
    events: BTreeMap<u64, EventView>,
    balances: BTreeMap<String, u64>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, notification: &Notification) {
        match notification {
            Notification::EventCreated {
                event,
                organizer,
                scheduled_at,
                deposit_amount,
                max_capacity,
                metadata,
            } => {
                self.events.insert(
                    *event,
                    EventView {
                        event: *event,
                        organizer: account_hex(organizer),
                        scheduled_at: *scheduled_at,
                        deposit_amount: *deposit_amount,
                        max_capacity: *max_capacity,
                        metadata: metadata.clone(),
                        reservations: Vec::new(),
                        confirmed_count: 0,
                        total_held: 0,
                        settled: false,
                        swept_amount: None,
                    },
                );
            }
            Notification::ReservationAccepted { event, participant } => {
                let Some(view) = self.events.get_mut(event) else {
                    return;
                };
                let participant = account_hex(participant);
                let funds = self.balances.entry(participant.clone()).or_default();
                *funds = funds.saturating_sub(view.deposit_amount);
                view.total_held += view.deposit_amount;
                view.reservations.push(ReservationView {
                    participant,
                    confirmed: false,
                    refunded: false,
                });
            }
            Notification::AttendeeConfirmed { event, participant } => {
                let Some(view) = self.events.get_mut(event) else {
                    return;
                };
                let participant = account_hex(participant);
                if let Some(reservation) = view
                    .reservations
                    .iter_mut()
                    .find(|reservation| reservation.participant == participant)
                {
                    reservation.confirmed = true;
                    reservation.refunded = true;
                }
                view.confirmed_count += 1;
                view.total_held = view.total_held.saturating_sub(view.deposit_amount);
                *self.balances.entry(participant).or_default() += view.deposit_amount;
            }
            Notification::DepositsSwept {
                event,
                organizer,
                amount,
            } => {
                let Some(view) = self.events.get_mut(event) else {
                    return;
                };
                for reservation in view.reservations.iter_mut() {
                    reservation.refunded = true;
                }
                view.total_held = 0;
                view.settled = true;
                view.swept_amount = Some(*amount);
                *self.balances.entry(account_hex(organizer)).or_default() += amount;
            }
            Notification::Funded { account, amount } => {
                *self.balances.entry(account_hex(account)).or_default() += amount;
            }
        }
    }

    pub fn handle_all<'a>(
        &mut self,
        notifications: impl IntoIterator<Item = &'a Notification>,
    ) {
        for notification in notifications {
            self.handle(notification);
        }
    }

    pub fn event(&self, event: u64) -> Option<&EventView> {
        self.events.get(&event)
    }

    /// Balance of `account` as implied by the stream. Unseen accounts hold 0.
    pub fn balance(&self, account: &PublicKey) -> u64 {
        self.balances
            .get(&account_hex(account))
            .copied()
            .unwrap_or(0)
    }

    pub fn view(&self) -> LedgerView {
        LedgerView {
            events: self.events.values().cloned().collect(),
            balances: self.balances.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_runtime::deterministic::Runner;
    use commonware_runtime::Runner as _;
    use muster_ledger::mocks::create_account;
    use muster_ledger::{balance, load_event, load_reservation, Layer, Memory, State};

    const DEPOSIT: u64 = 1_000_000;
    const GRACE: u64 = 1_000;
    const SCHEDULED_AT: u64 = 5_000;

    /// Runs one full lifecycle, committing between phases, and returns the
    /// final store plus the notifications each commit produced.
    async fn full_lifecycle(
        organizer: &PublicKey,
        shown: &PublicKey,
        absent: &PublicKey,
    ) -> (Memory, Vec<Vec<Notification>>) {
        let mut state = Memory::default();
        let mut batches = Vec::new();

        let mut layer = Layer::new(&state, 100, GRACE);
        let event = layer
            .create_event(organizer, SCHEDULED_AT, DEPOSIT, 3, "dinner".to_string())
            .await
            .unwrap();
        for participant in [shown, absent] {
            layer.fund(participant, 2 * DEPOSIT).await.unwrap();
            layer.reserve(participant, event, DEPOSIT).await.unwrap();
        }
        let (changes, notifications) = layer.commit();
        state.apply(changes).await.unwrap();
        batches.push(notifications);

        let mut layer = Layer::new(&state, 200, GRACE);
        layer.confirm_attendee(organizer, event, shown).await.unwrap();
        let (changes, notifications) = layer.commit();
        state.apply(changes).await.unwrap();
        batches.push(notifications);

        let mut layer = Layer::new(&state, SCHEDULED_AT + GRACE, GRACE);
        layer
            .withdraw_unclaimed_deposits(organizer, event)
            .await
            .unwrap();
        let (changes, notifications) = layer.commit();
        state.apply(changes).await.unwrap();
        batches.push(notifications);

        (state, batches)
    }

    #[test]
    fn indexed_views_match_state_reads() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let organizer = create_account(1);
            let shown = create_account(2);
            let absent = create_account(3);
            let (state, batches) = full_lifecycle(&organizer, &shown, &absent).await;

            let mut indexer = Indexer::new();
            for batch in &batches {
                indexer.handle_all(batch);
            }

            for account in [&organizer, &shown, &absent] {
                assert_eq!(
                    indexer.balance(account),
                    balance(&state, account).await.unwrap()
                );
            }

            let record = load_event(&state, 0).await.unwrap().unwrap();
            let view = indexer.event(0).unwrap();
            assert_eq!(view.organizer, account_hex(&record.organizer));
            assert_eq!(view.scheduled_at, record.scheduled_at);
            assert_eq!(view.deposit_amount, record.deposit_amount);
            assert_eq!(view.max_capacity, record.max_capacity);
            assert_eq!(view.metadata, record.metadata);
            assert_eq!(view.confirmed_count, record.confirmed_count);
            assert_eq!(view.total_held, record.total_held);
            assert_eq!(view.settled, record.settled);
            assert_eq!(view.reservations.len(), record.attendees.len());
            for (reservation_view, participant) in
                view.reservations.iter().zip(record.attendees.iter())
            {
                assert_eq!(reservation_view.participant, account_hex(participant));
                let reservation = load_reservation(&state, 0, participant)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(reservation_view.confirmed, reservation.confirmed);
                assert_eq!(reservation_view.refunded, reservation.refunded);
            }
        });
    }

    #[test]
    fn replaying_the_full_stream_rebuilds_the_same_view() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let organizer = create_account(1);
            let shown = create_account(2);
            let absent = create_account(3);
            let (_, batches) = full_lifecycle(&organizer, &shown, &absent).await;

            let mut incremental = Indexer::new();
            for batch in &batches {
                incremental.handle_all(batch);
            }

            let mut replayed = Indexer::new();
            replayed.handle_all(batches.iter().flatten());

            assert_eq!(incremental.view(), replayed.view());
        });
    }

    #[test]
    fn sweep_marks_only_unrefunded_reservations() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let organizer = create_account(1);
            let shown = create_account(2);
            let absent = create_account(3);
            let (_, batches) = full_lifecycle(&organizer, &shown, &absent).await;

            let mut indexer = Indexer::new();
            indexer.handle_all(batches.iter().flatten());

            let view = indexer.event(0).unwrap();
            assert!(view.settled);
            assert_eq!(view.swept_amount, Some(DEPOSIT));
            let shown_view = &view.reservations[0];
            assert!(shown_view.confirmed);
            assert!(shown_view.refunded);
            let absent_view = &view.reservations[1];
            assert!(!absent_view.confirmed);
            assert!(absent_view.refunded);

            // The organizer's gain is the absentee's deposit.
            assert_eq!(indexer.balance(&organizer), DEPOSIT);
            assert_eq!(indexer.balance(&shown), 2 * DEPOSIT);
            assert_eq!(indexer.balance(&absent), DEPOSIT);
        });
    }
}
