//! Observer server for logrelay.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/monitor`) where observers
//!   authenticate, receive the full backlog once, and then receive
//!   increments from the broadcast loop
//! - **REST endpoints** for status, backlogs, and message injection
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! [`WsHub`] is the push transport handed to the core's broadcast loop.
//! It keeps one bounded frame queue per connection plus named groups;
//! the core only ever addresses the `authenticated` group. Socket tasks
//! drain their own queue, so the loop never waits on the network.

pub mod error;
pub mod frames;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use hub::WsHub;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{spawn_observer, StartupError};
pub use state::AppState;
