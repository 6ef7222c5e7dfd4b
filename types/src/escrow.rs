//! Escrow ledger types and canonical encodings.
//!
//! Defines the event/reservation records, the state keys and values the
//! ledger persists, and the notification stream emitted to downstream
//! consumers. All wire formats are manual [commonware_codec] impls with a
//! one-byte tag per enum variant and big-endian integers.

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};
use commonware_cryptography::ed25519::PublicKey;

/// Helper to write a string as length-prefixed UTF-8 bytes.
fn write_string(s: &str, writer: &mut impl BufMut) {
    let bytes = s.as_bytes();
    (bytes.len() as u32).write(writer);
    writer.put_slice(bytes);
}

/// Helper to read a string from length-prefixed UTF-8 bytes.
fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("String", "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

/// Helper to get encode size of a string.
fn string_encode_size(s: &str) -> usize {
    4 + s.len()
}

/// Maximum byte length of an event's metadata pointer.
pub const MAX_METADATA_LENGTH: usize = 128;

/// Maximum number of reservation slots an event may be created with.
pub const MAX_EVENT_CAPACITY: u32 = 10_000;

/// Default sweep grace period after the scheduled start: seven days, in seconds.
pub const DEFAULT_GRACE_PERIOD: u64 = 7 * 24 * 60 * 60;

/// Escrow record for a single event.
///
/// Holds the terms fixed at creation and the running reservation and
/// settlement state. The metadata pointer is stored verbatim and never
/// interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Identity that created the event. Only the organizer may confirm
    /// attendees or sweep unclaimed deposits.
    pub organizer: PublicKey,
    /// Scheduled start of the event, in seconds.
    pub scheduled_at: u64,
    /// Exact amount every participant must stake to reserve a slot.
    pub deposit_amount: u64,
    /// Reservation cap, fixed at creation. At least 1.
    pub max_capacity: u32,
    /// Opaque pointer to off-ledger event content.
    pub metadata: String,
    /// Participants in reservation order.
    pub attendees: Vec<PublicKey>,
    /// Reservations confirmed so far.
    pub confirmed_count: u32,
    /// Deposits currently held in escrow for this event.
    pub total_held: u64,
    /// Whether unclaimed deposits have been swept to the organizer.
    pub settled: bool,
}

impl EventRecord {
    pub fn new(
        organizer: PublicKey,
        scheduled_at: u64,
        deposit_amount: u64,
        max_capacity: u32,
        metadata: String,
    ) -> Self {
        Self {
            organizer,
            scheduled_at,
            deposit_amount,
            max_capacity,
            metadata,
            attendees: Vec::new(),
            confirmed_count: 0,
            total_held: 0,
            settled: false,
        }
    }

    /// Whether every reservation slot is taken.
    pub fn is_full(&self) -> bool {
        self.attendees.len() >= self.max_capacity as usize
    }
}

impl Write for EventRecord {
    fn write(&self, writer: &mut impl BufMut) {
        self.organizer.write(writer);
        self.scheduled_at.write(writer);
        self.deposit_amount.write(writer);
        self.max_capacity.write(writer);
        write_string(&self.metadata, writer);
        self.attendees.write(writer);
        self.confirmed_count.write(writer);
        self.total_held.write(writer);
        self.settled.write(writer);
    }
}

impl Read for EventRecord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            organizer: PublicKey::read(reader)?,
            scheduled_at: u64::read(reader)?,
            deposit_amount: u64::read(reader)?,
            max_capacity: u32::read(reader)?,
            metadata: read_string(reader, MAX_METADATA_LENGTH)?,
            attendees: Vec::<PublicKey>::read_range(reader, 0..=MAX_EVENT_CAPACITY as usize)?,
            confirmed_count: u32::read(reader)?,
            total_held: u64::read(reader)?,
            settled: bool::read(reader)?,
        })
    }
}

impl EncodeSize for EventRecord {
    fn encode_size(&self) -> usize {
        self.organizer.encode_size()
            + self.scheduled_at.encode_size()
            + self.deposit_amount.encode_size()
            + self.max_capacity.encode_size()
            + string_encode_size(&self.metadata)
            + self.attendees.encode_size()
            + self.confirmed_count.encode_size()
            + self.total_held.encode_size()
            + self.settled.encode_size()
    }
}

/// A participant's reservation against one event.
///
/// The event id and participant identity live in the state key; only the
/// settlement flags are stored here. Both flags only ever move from false
/// to true.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reservation {
    /// Attendance confirmed by the organizer.
    pub confirmed: bool,
    /// Deposit released: back to the participant on confirmation, or to the
    /// organizer on sweep.
    pub refunded: bool,
}

impl Write for Reservation {
    fn write(&self, writer: &mut impl BufMut) {
        self.confirmed.write(writer);
        self.refunded.write(writer);
    }
}

impl Read for Reservation {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            confirmed: bool::read(reader)?,
            refunded: bool::read(reader)?,
        })
    }
}

impl EncodeSize for Reservation {
    fn encode_size(&self) -> usize {
        self.confirmed.encode_size() + self.refunded.encode_size()
    }
}

#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    /// Next unassigned event id (tag 0)
    Sequence,
    /// Spendable balance of an account (tag 1)
    Balance(PublicKey),
    /// Escrow record of an event (tag 2)
    Event(u64),
    /// A participant's reservation against an event (tag 3)
    Reservation(u64, PublicKey),
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Sequence => 0u8.write(writer),
            Self::Balance(account) => {
                1u8.write(writer);
                account.write(writer);
            }
            Self::Event(event) => {
                2u8.write(writer);
                event.write(writer);
            }
            Self::Reservation(event, participant) => {
                3u8.write(writer);
                event.write(writer);
                participant.write(writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match reader.get_u8() {
            0 => Self::Sequence,
            1 => Self::Balance(PublicKey::read(reader)?),
            2 => Self::Event(u64::read(reader)?),
            3 => Self::Reservation(u64::read(reader)?, PublicKey::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Sequence => 0,
                Self::Balance(_) => PublicKey::SIZE,
                Self::Event(_) => u64::SIZE,
                Self::Reservation(_, _) => u64::SIZE + PublicKey::SIZE,
            }
    }
}

/// State value, paired one-to-one with [Key] variants.
#[derive(Clone, Eq, PartialEq, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    /// Next unassigned event id (tag 0)
    Sequence(u64),
    /// Spendable balance of an account (tag 1)
    Balance(u64),
    /// Escrow record of an event (tag 2)
    Event(EventRecord),
    /// A participant's reservation flags (tag 3)
    Reservation(Reservation),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Sequence(next) => {
                0u8.write(writer);
                next.write(writer);
            }
            Self::Balance(balance) => {
                1u8.write(writer);
                balance.write(writer);
            }
            Self::Event(record) => {
                2u8.write(writer);
                record.write(writer);
            }
            Self::Reservation(reservation) => {
                3u8.write(writer);
                reservation.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match reader.get_u8() {
            0 => Self::Sequence(u64::read(reader)?),
            1 => Self::Balance(u64::read(reader)?),
            2 => Self::Event(EventRecord::read(reader)?),
            3 => Self::Reservation(Reservation::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Sequence(next) => next.encode_size(),
                Self::Balance(balance) => balance.encode_size(),
                Self::Event(record) => record.encode_size(),
                Self::Reservation(reservation) => reservation.encode_size(),
            }
    }
}

/// Externally observable effect of a committed operation.
///
/// Notifications are appended in operation order and are the only channel
/// downstream consumers receive. Each variant carries enough for an indexer
/// to rebuild the event and reservation tables without querying the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// A new event opened for reservations.
    /// Binary: [0] [event:u64 BE] [organizer] [scheduledAt:u64 BE] [depositAmount:u64 BE]
    ///         [maxCapacity:u32 BE] [metadataLen:u32 BE] [metadataBytes...]
    EventCreated {
        event: u64,
        organizer: PublicKey,
        scheduled_at: u64,
        deposit_amount: u64,
        max_capacity: u32,
        metadata: String,
    },

    /// A participant staked the deposit and took a slot.
    /// Binary: [1] [event:u64 BE] [participant]
    ReservationAccepted { event: u64, participant: PublicKey },

    /// The organizer confirmed attendance and the deposit went back to the
    /// participant.
    /// Binary: [2] [event:u64 BE] [participant]
    AttendeeConfirmed { event: u64, participant: PublicKey },

    /// The organizer collected every unclaimed deposit after the grace
    /// period.
    /// Binary: [3] [event:u64 BE] [organizer] [amount:u64 BE]
    DepositsSwept {
        event: u64,
        organizer: PublicKey,
        amount: u64,
    },

    /// An account was credited with fresh units.
    /// Binary: [4] [account] [amount:u64 BE]
    Funded { account: PublicKey, amount: u64 },
}

impl Write for Notification {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::EventCreated {
                event,
                organizer,
                scheduled_at,
                deposit_amount,
                max_capacity,
                metadata,
            } => {
                0u8.write(writer);
                event.write(writer);
                organizer.write(writer);
                scheduled_at.write(writer);
                deposit_amount.write(writer);
                max_capacity.write(writer);
                write_string(metadata, writer);
            }
            Self::ReservationAccepted { event, participant } => {
                1u8.write(writer);
                event.write(writer);
                participant.write(writer);
            }
            Self::AttendeeConfirmed { event, participant } => {
                2u8.write(writer);
                event.write(writer);
                participant.write(writer);
            }
            Self::DepositsSwept {
                event,
                organizer,
                amount,
            } => {
                3u8.write(writer);
                event.write(writer);
                organizer.write(writer);
                amount.write(writer);
            }
            Self::Funded { account, amount } => {
                4u8.write(writer);
                account.write(writer);
                amount.write(writer);
            }
        }
    }
}

impl Read for Notification {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let notification = match reader.get_u8() {
            0 => Self::EventCreated {
                event: u64::read(reader)?,
                organizer: PublicKey::read(reader)?,
                scheduled_at: u64::read(reader)?,
                deposit_amount: u64::read(reader)?,
                max_capacity: u32::read(reader)?,
                metadata: read_string(reader, MAX_METADATA_LENGTH)?,
            },
            1 => Self::ReservationAccepted {
                event: u64::read(reader)?,
                participant: PublicKey::read(reader)?,
            },
            2 => Self::AttendeeConfirmed {
                event: u64::read(reader)?,
                participant: PublicKey::read(reader)?,
            },
            3 => Self::DepositsSwept {
                event: u64::read(reader)?,
                organizer: PublicKey::read(reader)?,
                amount: u64::read(reader)?,
            },
            4 => Self::Funded {
                account: PublicKey::read(reader)?,
                amount: u64::read(reader)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(notification)
    }
}

impl EncodeSize for Notification {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::EventCreated {
                    event,
                    organizer,
                    scheduled_at,
                    deposit_amount,
                    max_capacity,
                    metadata,
                } => {
                    event.encode_size()
                        + organizer.encode_size()
                        + scheduled_at.encode_size()
                        + deposit_amount.encode_size()
                        + max_capacity.encode_size()
                        + string_encode_size(metadata)
                }
                Self::ReservationAccepted { event, participant }
                | Self::AttendeeConfirmed { event, participant } => {
                    event.encode_size() + participant.encode_size()
                }
                Self::DepositsSwept {
                    event,
                    organizer,
                    amount,
                } => event.encode_size() + organizer.encode_size() + amount.encode_size(),
                Self::Funded { account, amount } => account.encode_size() + amount.encode_size(),
            }
    }
}
