mod accounts;
mod events;
mod reservations;
mod settlement;
