pub mod escrow;

pub use escrow::{
    EventRecord, Key, Notification, Reservation, Value, DEFAULT_GRACE_PERIOD, MAX_EVENT_CAPACITY,
    MAX_METADATA_LENGTH,
};
