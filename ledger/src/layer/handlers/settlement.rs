use super::super::*;
use std::collections::BTreeSet;
use tracing::debug;

impl<'a, S: State> Layer<'a, S> {
    /// Marks `participant` as attended and refunds their deposit.
    ///
    /// Only the event's organizer may confirm, and each reservation can be
    /// confirmed once. The refund is immediate: it lands in the same layer.
    pub async fn confirm_attendee(
        &mut self,
        caller: &PublicKey,
        event: u64,
        participant: &PublicKey,
    ) -> Result<(), EscrowError> {
        let mut record = match load_event(self, event).await? {
            Some(record) => record,
            None => return Err(EscrowError::EventNotFound { event }),
        };
        if record.organizer != *caller {
            return Err(EscrowError::NotAuthorized {
                action: "confirm attendees",
            });
        }
        if record.settled {
            return Err(EscrowError::AlreadySettled { event });
        }
        let reservation = match load_reservation(self, event, participant).await? {
            Some(reservation) => reservation,
            None => return Err(EscrowError::ReservationNotFound { event }),
        };
        if reservation.confirmed {
            return Err(EscrowError::AlreadyConfirmed { event });
        }

        self.apply_confirmation(event, &mut record, participant).await?;
        self.insert(Key::Event(event), Value::Event(record));
        Ok(())
    }

    /// Confirms every listed attendee, or none of them.
    ///
    /// The whole list is validated before anything is staged: one unknown
    /// reservation, one already-confirmed attendee, one duplicate entry, or
    /// one refund that cannot fit rejects the batch. An empty list is a
    /// no-op once the caller and the event check out.
    pub async fn confirm_all_attendees(
        &mut self,
        caller: &PublicKey,
        event: u64,
        attendees: &[PublicKey],
    ) -> Result<(), EscrowError> {
        let mut record = match load_event(self, event).await? {
            Some(record) => record,
            None => return Err(EscrowError::EventNotFound { event }),
        };
        if record.organizer != *caller {
            return Err(EscrowError::NotAuthorized {
                action: "confirm attendees",
            });
        }
        if attendees.is_empty() {
            return Ok(());
        }
        if record.settled {
            return Err(EscrowError::AlreadySettled { event });
        }

        let mut seen = BTreeSet::new();
        for participant in attendees {
            let reservation = match load_reservation(self, event, participant).await? {
                Some(reservation) => reservation,
                None => return Err(EscrowError::ReservationNotFound { event }),
            };
            if reservation.confirmed || !seen.insert(participant.clone()) {
                return Err(EscrowError::AlreadyConfirmed { event });
            }
            // Entries are distinct, so each refund is exactly one deposit.
            let have = balance(self, participant).await?;
            if have.checked_add(record.deposit_amount).is_none() {
                return Err(EscrowError::InvalidParameters {
                    reason: "balance overflow",
                });
            }
        }

        for participant in attendees {
            self.apply_confirmation(event, &mut record, participant).await?;
        }
        self.insert(Key::Event(event), Value::Event(record));
        Ok(())
    }

    async fn apply_confirmation(
        &mut self,
        event: u64,
        record: &mut EventRecord,
        participant: &PublicKey,
    ) -> Result<(), EscrowError> {
        // The credit is the only fallible effect; stage nothing before it.
        self.credit(participant, record.deposit_amount).await?;
        self.insert(
            Key::Reservation(event, participant.clone()),
            Value::Reservation(Reservation {
                confirmed: true,
                refunded: true,
            }),
        );
        record.confirmed_count += 1;
        record.total_held -= record.deposit_amount;
        self.notify(Notification::AttendeeConfirmed {
            event,
            participant: participant.clone(),
        });
        Ok(())
    }

    /// Sweeps every unrefunded deposit on `event` to the organizer and
    /// settles the event, returning the amount swept.
    ///
    /// Opens once the grace period after the scheduled start has elapsed.
    /// Settling is terminal: no reservation, confirmation, or second sweep
    /// is accepted afterwards.
    pub async fn withdraw_unclaimed_deposits(
        &mut self,
        caller: &PublicKey,
        event: u64,
    ) -> Result<u64, EscrowError> {
        let mut record = match load_event(self, event).await? {
            Some(record) => record,
            None => return Err(EscrowError::EventNotFound { event }),
        };
        if record.organizer != *caller {
            return Err(EscrowError::NotAuthorized {
                action: "sweep deposits",
            });
        }
        let opens_at = record.scheduled_at.saturating_add(self.grace_period);
        if self.now < opens_at {
            return Err(EscrowError::TooEarly {
                now: self.now,
                opens_at,
            });
        }
        if record.settled {
            return Err(EscrowError::AlreadySettled { event });
        }

        let mut unclaimed = Vec::new();
        for participant in &record.attendees {
            let reservation = match load_reservation(self, event, participant).await? {
                Some(reservation) => reservation,
                None => {
                    return Err(EscrowError::State(anyhow::anyhow!(
                        "reservation missing for listed attendee"
                    )))
                }
            };
            if reservation.refunded {
                continue;
            }
            unclaimed.push((participant.clone(), reservation.confirmed));
        }

        // Cannot overflow: create_event bounds deposit_amount * max_capacity.
        let amount = unclaimed.len() as u64 * record.deposit_amount;
        if amount > 0 {
            self.credit(caller, amount).await?;
        }
        for (participant, confirmed) in unclaimed {
            self.insert(
                Key::Reservation(event, participant),
                Value::Reservation(Reservation {
                    confirmed,
                    refunded: true,
                }),
            );
        }
        record.total_held = 0;
        record.settled = true;
        self.insert(Key::Event(event), Value::Event(record));

        debug!(event, amount, "swept unclaimed deposits");
        self.notify(Notification::DepositsSwept {
            event,
            organizer: caller.clone(),
            amount,
        });
        Ok(amount)
    }
}
