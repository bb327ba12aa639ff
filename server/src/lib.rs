//! # Light-trail Game Server Library
//!
//! Authoritative server for a real-time multiplayer light-trail game.
//! Players steer a point that moves at constant speed across a 2D board,
//! leave a trail behind them and die when they run into any trail or off
//! the board. The last player standing wins the round.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the board, every player's position and heading, and the
//! frame counter. Clients only send key changes; everything else is decided
//! here and broadcast back.
//!
//! ### Input Reconciliation
//! Key events carry the frame at which the client saw the key change. When
//! such an event arrives a few frames late, the player is rewound to that
//! frame, the key is applied and the skipped frames are replayed, so the
//! trail bends where the player pressed the key rather than where the server
//! happened to receive it.
//!
//! ### State Broadcasting
//! Every tick the server broadcasts only the cells painted since the previous
//! tick plus each player's liveness. A full snapshot is sent once, when a
//! socket connects.
//!
//! ## Architecture Design
//!
//! ### Two Execution Contexts
//! Socket I/O runs on as many tasks as there are connections. The game runs
//! on a single task that owns the [`game::GameInstance`] outright, so the
//! game state needs no lock. The two sides talk only through the queues in
//! [`relay`].
//!
//! ### Fixed Tick
//! While a game is running the simulation task wakes on a fixed interval
//! (17ms by default). Each tick drains queued inputs, advances every live
//! player `speed` steps, resolves collisions and paints new trail cells.
//!
//! ## Module Organization
//!
//! ### Board Module (`board`)
//! Sparse occupancy grid of painted cells and the collision check.
//!
//! ### Reconciliation Module (`reconciliation`)
//! Rewind-apply-replay for late key events.
//!
//! ### Game Module (`game`)
//! Game state, partial state, the game instance and its tick loop.
//!
//! ### Relay Module (`relay`)
//! Inbound event channel, outbound queue and the dispatcher signal.
//!
//! ### Client Manager Module (`client_manager`)
//! Socket registry mapping connections to registered players.
//!
//! ### Network Module (`network`)
//! WebSocket listener, per-socket reader/writer tasks and the dispatcher.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::{EngineSettings, GameInstance};
//! use server::network::Server;
//! use server::relay;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let (network, simulation) = relay::channel();
//!     let game = GameInstance::new(simulation, EngineSettings::default());
//!     let server = Server::new("127.0.0.1:8080", 32, network).await?;
//!
//!     tokio::spawn(game.run());
//!     server.run().await
//! }
//! ```

pub mod board;
pub mod client_manager;
pub mod game;
pub mod network;
pub mod reconciliation;
pub mod relay;
