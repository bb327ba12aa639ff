//! Queues connecting the network tasks with the simulation task.
//!
//! Inbound events travel over an unbounded mpsc channel to the simulation.
//! Outbound messages travel over a second unbounded channel to the
//! dispatcher, which is woken through a [`Notify`] signal once the
//! simulation has finished a callback. A message is always sent before the
//! signal is raised, and `Notify` keeps a permit when nobody is waiting, so a
//! wakeup cannot be lost.

use log::debug;
use shared::{ConfigUpdate, GameMessage, KeyInput, Player, PlayerInfo};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};

/// Events sent from the network side to the simulation
#[derive(Debug)]
pub enum Inbound {
    Register {
        info: PlayerInfo,
        reply: oneshot::Sender<Player>,
    },
    UpdateConfig {
        player_id: u32,
        update: ConfigUpdate,
    },
    Input {
        player_id: u32,
        input: KeyInput,
        frame: i64,
    },
    Start,
    Disconnect {
        player_id: u32,
    },
    /// A socket joined and needs the current config and full state
    Welcome {
        client_id: u32,
    },
}

/// Recipient of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Player(u32),
    /// A socket by connection id, whether or not it has registered
    Client(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub message: GameMessage,
}

/// Simulation end of the outbound queue
///
/// Sending never blocks. If the dispatcher is gone the message is dropped,
/// since there is nobody left to deliver it to.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<Outbound>,
    signal: Arc<Notify>,
}

impl Outbox {
    fn push(&self, target: Target, message: GameMessage) {
        if let Err(e) = self.sender.send(Outbound { target, message }) {
            debug!("Outbound queue closed, dropping {:?}", e.0.message.kind);
        }
    }

    pub fn broadcast(&self, message: GameMessage) {
        self.push(Target::All, message);
    }

    pub fn send_to(&self, player_id: u32, message: GameMessage) {
        self.push(Target::Player(player_id), message);
    }

    pub fn send_to_client(&self, client_id: u32, message: GameMessage) {
        self.push(Target::Client(client_id), message);
    }

    /// Wakes the dispatcher, whether or not anything was queued.
    pub fn signal(&self) {
        self.signal.notify_one();
    }
}

/// Dispatcher end of the outbound queue
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::UnboundedReceiver<Outbound>,
    signal: Arc<Notify>,
}

impl OutboundQueue {
    /// Waits until the simulation raises the signal.
    pub async fn wait(&self) {
        self.signal.notified().await;
    }

    /// Takes every queued message in FIFO order without waiting.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut batch = Vec::new();
        while let Ok(outbound) = self.receiver.try_recv() {
            batch.push(outbound);
        }
        batch
    }
}

/// Handles owned by the network tasks
#[derive(Debug)]
pub struct NetworkSide {
    pub inbound: mpsc::UnboundedSender<Inbound>,
    pub outbound: OutboundQueue,
}

/// Handles owned by the simulation task
#[derive(Debug)]
pub struct SimulationSide {
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    pub outbox: Outbox,
}

/// Creates a connected pair of relay endpoints.
pub fn channel() -> (NetworkSide, SimulationSide) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let signal = Arc::new(Notify::new());

    (
        NetworkSide {
            inbound: inbound_tx,
            outbound: OutboundQueue {
                receiver: outbound_rx,
                signal: Arc::clone(&signal),
            },
        },
        SimulationSide {
            inbound: inbound_rx,
            outbox: Outbox {
                sender: outbound_tx,
                signal,
            },
        },
    )
}
