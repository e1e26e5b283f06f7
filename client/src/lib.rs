//! # Forbidden Word Terminal Client
//!
//! A headless client for the forbidden word server. It joins one room, prints
//! what happens there and turns typed lines into protocol messages.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local copy of the room: own connection id, the latest player map and the
//! player this client picks a forbidden word for. The target is the next id
//! after our own in the word-setter snapshot, wrapping around, so every client
//! derives a distinct target from the same snapshot.
//!
//! ### Input Module (`input`)
//! Parses `/start`, `/word <text>`, `/end`, `/move <x> <y>`, `/players` and
//! `/quit`. Any other line is sent as chat.
//!
//! ### Network Module (`network`)
//! TCP connection to the server, framed with the codec from `shared`.

pub mod game;
pub mod input;
pub mod network;
