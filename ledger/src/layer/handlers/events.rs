use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    /// Registers a new event and returns its identifier.
    ///
    /// Identifiers are allocated from a single sequence, so two events never
    /// collide even across layers. The deposit and capacity are fixed for
    /// the life of the event.
    pub async fn create_event(
        &mut self,
        organizer: &PublicKey,
        scheduled_at: u64,
        deposit_amount: u64,
        max_capacity: u32,
        metadata: String,
    ) -> Result<u64, EscrowError> {
        if max_capacity < 1 {
            return Err(EscrowError::InvalidParameters {
                reason: "capacity must be at least 1",
            });
        }
        if max_capacity > MAX_EVENT_CAPACITY {
            return Err(EscrowError::InvalidParameters {
                reason: "capacity above maximum",
            });
        }
        if metadata.len() > MAX_METADATA_LENGTH {
            return Err(EscrowError::InvalidParameters {
                reason: "metadata too long",
            });
        }
        // The sweep credits at most deposit_amount * max_capacity in one
        // operation, so reject events where that product cannot be held.
        if deposit_amount.checked_mul(max_capacity as u64).is_none() {
            return Err(EscrowError::InvalidParameters {
                reason: "deposit times capacity overflows",
            });
        }
        if scheduled_at <= self.now {
            return Err(EscrowError::InvalidParameters {
                reason: "scheduled start must be in the future",
            });
        }

        let event = match self.get(&Key::Sequence).await? {
            Some(Value::Sequence(next)) => next,
            _ => 0,
        };
        self.insert(Key::Sequence, Value::Sequence(event + 1));
        self.insert(
            Key::Event(event),
            Value::Event(EventRecord::new(
                organizer.clone(),
                scheduled_at,
                deposit_amount,
                max_capacity,
                metadata.clone(),
            )),
        );
        self.notify(Notification::EventCreated {
            event,
            organizer: organizer.clone(),
            scheduled_at,
            deposit_amount,
            max_capacity,
            metadata,
        });
        Ok(event)
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
    fn identifiers_are_sequential() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = Memory::default();
            let organizer = create_account(1);

            let mut layer = Layer::new(&state, 100, 0);
            let first = layer
                .create_event(&organizer, 200, 10, 5, "first".to_string())
                .await
                .unwrap();
            let second = layer
                .create_event(&organizer, 300, 10, 5, "second".to_string())
                .await
                .unwrap();
            assert_eq!(first, 0);
            assert_eq!(second, 1);

            let (changes, _) = layer.commit();
            state.apply(changes).await.unwrap();

            // The sequence survives a commit.
            let mut layer = Layer::new(&state, 100, 0);
            let third = layer
                .create_event(&organizer, 400, 10, 5, "third".to_string())
                .await
                .unwrap();
            assert_eq!(third, 2);
        });
    }

    #[test]
    fn created_event_is_stored() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = Memory::default();
            let organizer = create_account(1);

            let mut layer = Layer::new(&state, 100, 0);
            let event = layer
                .create_event(&organizer, 5_000, 1_000_000, 3, "standup".to_string())
                .await
                .unwrap();

            let record = load_event(&layer, event).await.unwrap().unwrap();
            assert_eq!(record.organizer, organizer);
            assert_eq!(record.scheduled_at, 5_000);
            assert_eq!(record.deposit_amount, 1_000_000);
            assert_eq!(record.max_capacity, 3);
            assert_eq!(record.metadata, "standup");
            assert!(record.attendees.is_empty());
            assert_eq!(record.confirmed_count, 0);
            assert_eq!(record.total_held, 0);
            assert!(!record.settled);
        });
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = Memory::default();
            let organizer = create_account(1);
            let mut layer = Layer::new(&state, 100, 0);

            assert!(matches!(
                layer
                    .create_event(&organizer, 200, 10, 0, String::new())
                    .await,
                Err(EscrowError::InvalidParameters {
                    reason: "capacity must be at least 1"
                })
            ));
            assert!(matches!(
                layer
                    .create_event(&organizer, 200, 10, MAX_EVENT_CAPACITY + 1, String::new())
                    .await,
                Err(EscrowError::InvalidParameters {
                    reason: "capacity above maximum"
                })
            ));
            assert!(matches!(
                layer
                    .create_event(
                        &organizer,
                        200,
                        10,
                        5,
                        "m".repeat(MAX_METADATA_LENGTH + 1)
                    )
                    .await,
                Err(EscrowError::InvalidParameters {
                    reason: "metadata too long"
                })
            ));
            assert!(matches!(
                layer
                    .create_event(&organizer, 200, u64::MAX, 2, String::new())
                    .await,
                Err(EscrowError::InvalidParameters {
                    reason: "deposit times capacity overflows"
                })
            ));
            assert!(matches!(
                layer
                    .create_event(&organizer, 100, 10, 5, String::new())
                    .await,
                Err(EscrowError::InvalidParameters {
                    reason: "scheduled start must be in the future"
                })
            ));

            // Nothing staged, nothing announced.
            let (changes, notifications) = layer.commit();
            assert!(changes.is_empty());
            assert!(notifications.is_empty());
        });
    }
}
