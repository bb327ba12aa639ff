//! WebSocket front end of the server
//!
//! Each accepted socket gets a reader loop and a writer task. The reader
//! decodes client messages and forwards them to the simulation through the
//! inbound queue, tagged with the player bound to the socket. A single
//! dispatcher task waits on the outbox signal and fans simulation output
//! out to the sockets.

use crate::client_manager::ClientManager;
use crate::relay::{Inbound, NetworkSide, Outbound, OutboundQueue, Target};
use futures_util::{SinkExt, Stream, StreamExt};
use log::{debug, error, info, warn};
use shared::{ConfigUpdate, GameMessage, KeyInput, MessageType, PlayerInfo};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_tungstenite::tungstenite::Message;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sending half of the simulation's inbound queue
type InboundSender = mpsc::UnboundedSender<Inbound>;

/// Accepts WebSocket connections and relays their traffic
pub struct Server {
    listener: TcpListener,
    clients: Arc<RwLock<ClientManager>>,
    relay: NetworkSide,
}

impl Server {
    /// Binds the listener. Nothing is accepted until [`Server::run`].
    pub async fn new(
        addr: &str,
        max_clients: usize,
        relay: NetworkSide,
    ) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            relay,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails
    ///
    /// The outbound queue moves into the dispatcher task; every connection
    /// task gets its own handle on the inbound queue.
    pub async fn run(self) -> Result<(), BoxError> {
        let Server {
            listener,
            clients,
            relay,
        } = self;
        let NetworkSide { inbound, outbound } = relay;

        spawn_dispatcher(outbound, Arc::clone(&clients));

        loop {
            let (stream, addr) = listener.accept().await?;
            let clients = Arc::clone(&clients);
            let inbound = inbound.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, clients, inbound).await {
                    warn!("Connection from {} closed with error: {}", addr, e);
                }
            });
        }
    }
}

/// Spawns the task that forwards simulation output to the sockets
fn spawn_dispatcher(mut outbound: OutboundQueue, clients: Arc<RwLock<ClientManager>>) {
    tokio::spawn(async move {
        loop {
            outbound.wait().await;
            dispatch(outbound.drain(), &clients).await;
        }
    });
}

/// Sends every message of a drained batch to its target
async fn dispatch(batch: Vec<Outbound>, clients: &RwLock<ClientManager>) {
    if batch.is_empty() {
        return;
    }

    let clients = clients.read().await;
    for Outbound { target, message } in batch {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {:?} message: {}", message.kind, e);
                continue;
            }
        };

        match target {
            Target::All => clients.broadcast_text(&text),
            Target::Player(player_id) => {
                if !clients.send_to_player(player_id, &text) {
                    debug!("No open socket for player {}", player_id);
                }
            }
            Target::Client(client_id) => match clients.client(client_id) {
                Some(client) => {
                    client.send_text(&text);
                }
                None => debug!("Client {} left before {:?}", client_id, message.kind),
            },
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    inbound: InboundSender,
) -> Result<(), BoxError> {
    let socket = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if let Err(e) = ws_tx.send(frame).await {
                debug!("Writer for {} stopped: {}", addr, e);
                break;
            }
        }
    });

    let client_id = {
        let mut clients = clients.write().await;
        clients.add_client(addr, frame_tx.clone())
    };

    let Some(client_id) = client_id else {
        info!("Refusing {}: server full", addr);
        let refusal = GameMessage::new(MessageType::Rejected, "server full").to_json()?;
        frame_tx.send(Message::Text(refusal.into()))?;
        frame_tx.send(Message::Close(None))?;
        return Ok(());
    };

    let result = serve_client(client_id, &mut ws_rx, &clients, &inbound).await;

    let player_id = clients.write().await.remove_client(client_id);
    if let Some(player_id) = player_id {
        inbound.send(Inbound::Disconnect { player_id })?;
    }

    result
}

async fn serve_client<S>(
    client_id: u32,
    ws_rx: &mut S,
    clients: &RwLock<ClientManager>,
    inbound: &InboundSender,
) -> Result<(), BoxError>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    // The simulation queues the welcome frames behind anything already in
    // the outbox, so the snapshot always precedes the next partial state.
    inbound.send(Inbound::Welcome { client_id })?;

    while let Some(frame) = ws_rx.next().await {
        match frame? {
            Message::Text(text) => handle_text(client_id, text.as_str(), clients, inbound).await?,
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}

/// Decodes one client message and forwards it to the simulation
///
/// Unreadable messages are logged and skipped. Until a socket has
/// registered, everything except `registerPlayer` is dropped.
async fn handle_text(
    client_id: u32,
    text: &str,
    clients: &RwLock<ClientManager>,
    inbound: &InboundSender,
) -> Result<(), BoxError> {
    let message = match GameMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Client {} sent an unreadable message: {}", client_id, e);
            return Ok(());
        }
    };

    let player_id = clients.read().await.player_for(client_id);

    let Some(player_id) = player_id else {
        if message.kind == MessageType::RegisterPlayer {
            register(client_id, &message, clients, inbound).await?;
        } else {
            debug!(
                "Dropping {:?} from unregistered client {}",
                message.kind, client_id
            );
        }
        return Ok(());
    };

    match message.kind {
        MessageType::RegisterPlayer => {
            debug!("Client {} is already player {}", client_id, player_id);
        }
        MessageType::UpdateConfig => match message.payload::<ConfigUpdate>() {
            Ok(update) => inbound.send(Inbound::UpdateConfig { player_id, update })?,
            Err(e) => warn!("Player {} sent a bad config: {}", player_id, e),
        },
        MessageType::KeyDown | MessageType::KeyUp => match message.key_input() {
            Ok(input) => forward_input(inbound, player_id, input, message.game_frame)?,
            Err(e) => warn!("Player {} sent a bad key event: {}", player_id, e),
        },
        MessageType::StartGame => {
            info!("Player {} requested a game start", player_id);
            inbound.send(Inbound::Start)?;
        }
        other => warn!("Player {} sent unexpected {:?}", player_id, other),
    }

    Ok(())
}

fn forward_input(
    inbound: &InboundSender,
    player_id: u32,
    input: KeyInput,
    frame: i64,
) -> Result<(), BoxError> {
    inbound.send(Inbound::Input {
        player_id,
        input,
        frame,
    })?;
    Ok(())
}

async fn register(
    client_id: u32,
    message: &GameMessage,
    clients: &RwLock<ClientManager>,
    inbound: &InboundSender,
) -> Result<(), BoxError> {
    let info: PlayerInfo = match message.payload() {
        Ok(info) => info,
        Err(e) => {
            warn!("Client {} sent a bad registration: {}", client_id, e);
            return Ok(());
        }
    };

    let (reply, registered) = oneshot::channel();
    inbound.send(Inbound::Register { info, reply })?;
    let player = registered.await?;

    let mut clients = clients.write().await;
    if clients.bind_player(client_id, player.id) {
        let identity =
            GameMessage::new(MessageType::Identity, player.id.to_string()).with_player(player.id);
        if let Some(client) = clients.client(client_id) {
            client.send_text(&identity.to_json()?);
        }
    }

    Ok(())
}
