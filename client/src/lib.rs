//! # World Client Library
//!
//! Client-side synchronization core for the online multiplayer world. It
//! authenticates over HTTP, keeps a persistent WebSocket to the world
//! server, and maintains a local, continuously-updated view of shared world
//! state usable by a render loop running at a fixed frame rate.
//!
//! ## Architecture Overview
//!
//! Two independent timelines meet here: a background I/O thread delivering
//! unordered, heterogeneously-shaped messages, and a fixed-rate simulation
//! thread consuming them. They touch exactly two pieces of shared data —
//! the transport's inbound frame queue and the mutex-guarded world snapshot
//! — and neither lock is ever held across a network call, a parse, or a
//! render.
//!
//! ### Optimistic Movement
//! Local moves are checked against the tile grid and applied immediately,
//! hiding the server round-trip. The server remains the source of truth:
//! its next upsert for the entity overwrites the local guess, and because
//! upserts are idempotent and last-write-wins there is no pending-command
//! ledger.
//!
//! ### Tolerant Decoding
//! The message dispatcher reads every field through ordered alias lists
//! with documented defaults, so extra, missing, or oddly-typed fields never
//! hard-fail a frame. Malformed input degrades to an error line.
//!
//! ### Smoothing
//! Entities track an authoritative grid position and a separately rendered
//! position which eases toward it each tick and is never reset by updates.
//!
//! ## Module Organization
//!
//! - [`network`]: WebSocket transport with a dedicated background thread
//!   and a drainable inbound queue
//! - [`world`]: mutex-guarded world snapshot with copy-out reads
//! - [`dispatch`]: inbound message decoding and state transitions
//! - [`controller`]: rate-limited movement/attack/interact commands
//! - [`effects`]: render interpolation and combat text aging
//! - [`session`]: per-connection orchestration and reconnect supervision
//! - [`auth`]: HTTP login/registration/character-roster boundary

pub mod auth;
pub mod controller;
pub mod dispatch;
pub mod effects;
pub mod network;
pub mod session;
pub mod world;
