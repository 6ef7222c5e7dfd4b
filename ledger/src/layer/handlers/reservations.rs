use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    /// Reserves a slot on `event` for `participant`, moving exactly the
    /// event's deposit from the participant's balance into escrow.
    ///
    /// `paid` must equal the event's deposit amount. Reservations stay open
    /// until the deposits are swept, even past the scheduled start.
    pub async fn reserve(
        &mut self,
        participant: &PublicKey,
        event: u64,
        paid: u64,
    ) -> Result<(), EscrowError> {
        let mut record = match load_event(self, event).await? {
            Some(record) => record,
            None => return Err(EscrowError::EventNotFound { event }),
        };
        if record.settled {
            return Err(EscrowError::AlreadySettled { event });
        }
        if record.is_full() {
            return Err(EscrowError::EventFull {
                event,
                max_capacity: record.max_capacity,
            });
        }
        if load_reservation(self, event, participant).await?.is_some() {
            return Err(EscrowError::DuplicateReservation { event });
        }
        if paid != record.deposit_amount {
            return Err(EscrowError::IncorrectDepositAmount {
                expected: record.deposit_amount,
                got: paid,
            });
        }
        self.debit(participant, record.deposit_amount).await?;

        record.attendees.push(participant.clone());
        record.total_held += record.deposit_amount;
        self.insert(Key::Event(event), Value::Event(record));
        self.insert(
            Key::Reservation(event, participant.clone()),
            Value::Reservation(Reservation::default()),
        );
        self.notify(Notification::ReservationAccepted {
            event,
            participant: participant.clone(),
        });
        Ok(())
    }
}
