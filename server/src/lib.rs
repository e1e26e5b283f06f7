//! # Forbidden Word Server Library
//!
//! Authoritative server for the multi-room "forbidden word" party game. Players
//! join rooms by code, move avatars around a shared canvas, secretly assign a
//! forbidden word to the next player, and are eliminated when they type their
//! own word or stay silent for too long. The last player standing wins.
//!
//! ## Architecture Design
//!
//! ### One Task per Room
//! Each room is owned by a single task that applies commands one at a time.
//! Joins, chat, readiness and timer expiries for the same room are therefore
//! never interleaved, while separate rooms make progress in parallel.
//!
//! ### TCP Transport
//! Clients talk to the server over TCP using length-prefixed bincode frames
//! (see the `shared` crate). Each connection has a reader task that routes
//! inbound messages to rooms and a writer task that drains its outbound queue.
//!
//! ## Module Organization
//!
//! ### Room Module (`room`)
//! Pure room state: players, host, status and the rules that mutate them.
//!
//! ### Session Module (`session`)
//! Binds a room to its timers and broadcast dispatcher and turns commands into
//! state changes plus outbound messages.
//!
//! ### Timers Module (`timers`)
//! Per-player AFK countdowns with stale-expiry protection.
//!
//! ### Broadcast Module (`broadcast`)
//! Fan-out of snapshots and notifications to room members.
//!
//! ### Room Store Module (`room_store`)
//! Creates rooms on demand and retires them once empty.
//!
//! ### Connection Registry Module (`connection_registry`)
//! Connection ids, capacity and the room each connection is bound to.
//!
//! ### Network Module (`network`)
//! Accept loop and per-connection reader and writer tasks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod connection_registry;
pub mod network;
pub mod room;
pub mod room_store;
pub mod session;
pub mod timers;
