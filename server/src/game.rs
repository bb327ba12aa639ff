//! Authoritative game state and the fixed-rate simulation loop.
//!
//! A [`GameInstance`] is owned by exactly one task. Network tasks never touch
//! it directly; they talk to it through the relay queues. While no game is
//! running the task waits for inbound events one at a time. Once a game is
//! started it switches to a fixed interval and drains the inbound queue at
//! the start of every tick.

use crate::board::TrailGrid;
use crate::reconciliation::{reconcile, Reconciliation};
use crate::relay::{Inbound, Outbox, SimulationSide};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::{
    BoardConfig, Cell, ConfigUpdate, GameMessage, KeyInput, MessageType, Player, PlayerInfo,
    PlayerStatus,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Engine tunables that are not part of the per-game board configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Period of the simulation callback
    pub tick_interval: Duration,
    /// Pause between the first frame of a game and the periodic ticks
    pub start_delay: Duration,
    /// Probability per step that a player starts a trail gap
    pub gap_chance: f64,
    /// Longest possible trail gap in steps
    pub max_gap_frames: u32,
    /// Fixed RNG seed, for reproducible games
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(17),
            start_delay: Duration::from_millis(2000),
            gap_chance: 0.01,
            max_gap_frames: 9,
            seed: None,
        }
    }
}

/// Full authoritative snapshot, sent to clients when they connect
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub cells: TrailGrid,
    pub players: Vec<Player>,
    pub game_frame: u32,
}

impl GameState {
    /// Empty board sized for `config`, no players, frame 0.
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            cells: TrailGrid::for_config(config),
            players: Vec::new(),
            game_frame: 0,
        }
    }

    /// Clears the board, drops disconnected players and respawns the rest.
    pub fn reset<R: Rng + ?Sized>(&mut self, config: &BoardConfig, rng: &mut R) {
        self.cells = TrailGrid::for_config(config);
        self.game_frame = 0;
        self.players.retain(|player| player.connected);

        for player in &mut self.players {
            player.reset(config, rng);
        }
    }

    /// Looks up a player by id, registered or spawned.
    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// Number of players still on the board this round
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|player| player.alive).count()
    }
}

/// Incremental update broadcast once per tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialState {
    pub cells: Vec<Cell>,
    pub game_frame: u32,
    pub players: Vec<PlayerStatus>,
}

/// What a newly connected socket needs to catch up
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: BoardConfig,
    pub state: GameMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Running,
    Ended,
}

/// Result of handling one inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    StartRequested,
}

pub struct GameInstance {
    config: BoardConfig,
    state: GameState,
    pending_cells: Vec<Cell>,
    phase: Phase,
    next_player_id: u32,
    settings: EngineSettings,
    rng: StdRng,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbox: Outbox,
}

impl GameInstance {
    /// Creates an instance in the lobby with the default board.
    ///
    /// Out-of-range settings are clamped; a gap chance that is not a number
    /// falls back to the default.
    pub fn new(relay: SimulationSide, mut settings: EngineSettings) -> Self {
        settings.gap_chance = if settings.gap_chance.is_nan() {
            EngineSettings::default().gap_chance
        } else {
            settings.gap_chance.clamp(0.0, 1.0)
        };
        settings.max_gap_frames = settings.max_gap_frames.max(1);

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let config = BoardConfig::default();

        Self {
            state: GameState::new(&config),
            config,
            pending_cells: Vec::new(),
            phase: Phase::NotStarted,
            next_player_id: 0,
            settings,
            rng,
            inbound: relay.inbound,
            outbox: relay.outbox,
        }
    }

    /// Board configuration that the next (or current) game uses
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct access to the authoritative state.
    ///
    /// Only the task owning the instance can call this, so no other task
    /// ever observes a half-applied change.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while the fixed-rate tick is active
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// True from the start of a game until the instance is reset for the next one
    pub fn has_started(&self) -> bool {
        self.phase != Phase::NotStarted
    }

    /// Adds a player and announces it to everyone.
    pub fn register_player(&mut self, info: PlayerInfo) -> Player {
        let player = Player::new(self.next_player_id, info);
        self.next_player_id += 1;

        info!("Registered player {} ({})", player.id, player.name);
        self.state.players.push(player.clone());

        let message = payload_message(MessageType::RegisterPlayer, &player)
            .with_player(player.id)
            .with_frame(self.state.game_frame);
        self.outbox.broadcast(message);

        player
    }

    /// Applies a configuration change, or rejects it once a game has started.
    ///
    /// Accepted changes are echoed to every client; a rejection only goes
    /// back to the requesting player.
    pub fn update_config(&mut self, player_id: u32, update: &ConfigUpdate) -> bool {
        if self.has_started() {
            debug!("Rejected config update from player {}", player_id);
            self.outbox.send_to(
                player_id,
                GameMessage::new(MessageType::Rejected, "game already started")
                    .with_player(player_id),
            );
            return false;
        }

        self.config.apply(update);
        info!("Board config updated: {:?}", self.config);

        self.outbox
            .broadcast(payload_message(MessageType::UpdateConfig, &self.config));
        true
    }

    /// Applies a key change, replaying it from the frame the client reported
    /// when that frame is still within reach.
    pub fn handle_input(&mut self, player_id: u32, input: KeyInput, frame: i64) {
        let current_frame = self.state.game_frame;
        let Some(player) = self.state.player_mut(player_id) else {
            debug!("Dropping input for unknown player {}", player_id);
            return;
        };

        let outcome = match u32::try_from(frame) {
            Ok(frame) => reconcile(player, input, frame, current_frame),
            Err(_) => Reconciliation::Stale,
        };

        if !matches!(outcome, Reconciliation::Applied { .. }) {
            debug!(
                "Input from player {} for frame {} not replayed ({:?})",
                player_id, frame, outcome
            );
            player.apply_input(input);
        }
    }

    /// Marks a player as gone and tells everyone.
    ///
    /// The player keeps its slot, score and trail until the next game
    /// starts, when disconnected players are removed.
    pub fn disconnect_player(&mut self, player_id: u32) {
        if let Some(player) = self.state.player_mut(player_id) {
            player.connected = false;
            info!("Player {} disconnected", player_id);

            self.outbox.broadcast(
                GameMessage::new(MessageType::PlayerDisconnected, player_id.to_string())
                    .with_player(player_id),
            );
        }
    }

    /// Current config plus the full state as a ready-to-send `gameState`.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: self.config.clone(),
            state: payload_message(MessageType::GameState, &self.state)
                .with_frame(self.state.game_frame),
        }
    }

    /// Brings a freshly connected socket up to date.
    ///
    /// Everyone learns about the connection, then the socket gets the
    /// config, its connection id and the full state. All of it goes through
    /// the outbox, so every later partial state reaches the socket after the
    /// snapshot it builds on.
    pub fn welcome(&mut self, client_id: u32) {
        let Snapshot { config, state } = self.snapshot();

        self.outbox
            .broadcast(GameMessage::new(MessageType::Connection, "").with_player(client_id));
        self.outbox
            .send_to_client(client_id, payload_message(MessageType::UpdateConfig, &config));
        self.outbox.send_to_client(
            client_id,
            GameMessage::new(MessageType::Identity, client_id.to_string()).with_player(client_id),
        );
        self.outbox.send_to_client(client_id, state);
    }

    /// Handles one inbound event.
    ///
    /// Start requests are only reported back to the caller, which owns the
    /// timer, and are ignored while a game is running.
    pub fn handle_event(&mut self, event: Inbound) -> Control {
        match event {
            Inbound::Register { info, reply } => {
                let player = self.register_player(info);
                if reply.send(player).is_err() {
                    debug!("Registration reply dropped, socket already gone");
                }
            }
            Inbound::UpdateConfig { player_id, update } => {
                self.update_config(player_id, &update);
            }
            Inbound::Input {
                player_id,
                input,
                frame,
            } => self.handle_input(player_id, input, frame),
            Inbound::Start => {
                if self.is_running() {
                    debug!("Start requested while running, ignoring");
                } else {
                    return Control::StartRequested;
                }
            }
            Inbound::Disconnect { player_id } => self.disconnect_player(player_id),
            Inbound::Welcome { client_id } => self.welcome(client_id),
        }

        Control::Continue
    }

    /// Handles every queued inbound event without waiting.
    pub fn drain_inbound(&mut self) {
        while let Ok(event) = self.inbound.try_recv() {
            self.handle_event(event);
        }
    }

    /// Resets the board for a new game and announces it. Returns false if a
    /// game is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }

        for player in self.state.players.iter().filter(|p| !p.connected) {
            self.outbox.broadcast(
                GameMessage::new(MessageType::PlayerRemoved, "").with_player(player.id),
            );
        }

        self.state.reset(&self.config, &mut self.rng);
        self.pending_cells.clear();
        self.phase = Phase::Running;

        info!(
            "Game started with {} players on a {}x{} board",
            self.state.players.len(),
            self.config.board_width,
            self.config.board_height
        );

        self.outbox
            .broadcast(GameMessage::new(MessageType::StartGame, "").with_frame(0));
        self.outbox.signal();
        true
    }

    /// Returns a finished game to the lobby so it can be configured and
    /// started again.
    pub fn finish(&mut self) {
        if self.phase == Phase::Ended {
            self.phase = Phase::NotStarted;
        }
    }

    /// One simulation callback.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }

        self.drain_inbound();

        let mut alive = self.state.alive_count();
        for _ in 0..self.config.speed {
            alive = self.step(alive);
        }

        let frame = self.state.game_frame;
        if alive <= 1 {
            info!("Game over at frame {}", frame);
            self.phase = Phase::Ended;
            self.outbox
                .broadcast(GameMessage::new(MessageType::GameOver, "").with_frame(frame));
        } else {
            let message = self.partial_state_message();
            self.outbox.broadcast(message);
        }

        if frame % 60 == 0 {
            debug!(
                "Frame {}: {} players alive, {} cells painted",
                frame,
                alive,
                self.state.cells.len()
            );
        }

        self.state.game_frame += 1;
        self.outbox.signal();
    }

    /// One physics pass: move, roll gaps, detect deaths, then paint.
    /// Returns the alive count after this step's deaths.
    pub fn step(&mut self, alive: usize) -> usize {
        let frame = self.state.game_frame;
        let mut deaths = 0;

        for index in 0..self.state.players.len() {
            let player = &mut self.state.players[index];
            if !player.alive {
                continue;
            }

            player.process_frame();

            if !player.in_gap() && self.rng.gen_bool(self.settings.gap_chance) {
                player.no_trail_frames = self.rng.gen_range(1..=self.settings.max_gap_frames);
            }

            let died = !self.config.contains(player.x, player.y)
                || self.state.cells.collides(player);
            if !died {
                continue;
            }

            player.alive = false;
            let id = player.id;
            deaths += 1;
            info!("Player {} died at frame {}", id, frame);

            for survivor in self.state.players.iter_mut().filter(|p| p.alive) {
                survivor.score += 1;
            }

            self.outbox.broadcast(
                GameMessage::new(MessageType::PlayerDied, id.to_string())
                    .with_player(id)
                    .with_frame(frame),
            );
        }

        let cell_size = self.config.cell_size;
        for player in self.state.players.iter_mut().filter(|p| p.alive) {
            if player.in_gap() {
                player.no_trail_frames -= 1;
                continue;
            }
            if !self.config.contains(player.x, player.y) {
                continue;
            }

            let (x, y) = player.cell_position();
            let cell = Cell::new(x, y, player.color.clone(), cell_size);
            if self.state.cells.paint(cell.clone()) {
                self.pending_cells.push(cell);
            }
        }

        alive.saturating_sub(deaths)
    }

    /// Collects the cells painted since the last call along with liveness.
    pub fn take_partial_state(&mut self) -> PartialState {
        PartialState {
            cells: std::mem::take(&mut self.pending_cells),
            game_frame: self.state.game_frame,
            players: self.state.players.iter().map(PlayerStatus::from).collect(),
        }
    }

    fn partial_state_message(&mut self) -> GameMessage {
        let partial = self.take_partial_state();
        payload_message(MessageType::PartialState, &partial).with_frame(partial.game_frame)
    }

    /// Runs the instance until every network handle is gone.
    pub async fn run(mut self) {
        info!("Game instance waiting for players");

        while let Some(event) = self.inbound.recv().await {
            let control = self.handle_event(event);
            self.outbox.signal();
            if control == Control::StartRequested {
                self.play().await;
            }
        }

        info!("Inbound queue closed, game instance shutting down");
    }

    /// Plays one game to completion.
    async fn play(&mut self) {
        if !self.start() {
            return;
        }

        self.tick();
        sleep(self.settings.start_delay).await;

        let mut tick_timer = interval(self.settings.tick_interval);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.is_running() {
            tick_timer.tick().await;
            self.tick();
        }

        self.finish();
        self.outbox.signal();
        info!("Game ended, back in the lobby");
    }
}

fn payload_message<T: Serialize>(kind: MessageType, payload: &T) -> GameMessage {
    GameMessage::with_payload(kind, payload).unwrap_or_else(|e| {
        error!("Failed to encode {:?} payload: {}", kind, e);
        GameMessage::new(kind, "")
    })
}
