//! Socket bookkeeping for the network side of the server
//!
//! This module tracks every open WebSocket connection and, once the socket
//! has registered, the player it speaks for. The simulation only ever sees
//! player ids; socket handles and addresses stay here.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Outgoing frame queue of one socket
pub type FrameSender = mpsc::UnboundedSender<Message>;

/// An open socket and the player bound to it
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: u32,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Player registered through this socket, if any
    pub player_id: Option<u32>,
    /// Writer task queue for this socket
    pub sender: FrameSender,
}

impl Client {
    /// Creates an unbound client around the writer queue of its socket.
    pub fn new(id: u32, addr: SocketAddr, sender: FrameSender) -> Self {
        Self {
            id,
            addr,
            player_id: None,
            sender,
        }
    }

    /// Queues a text frame. Returns false if the writer task has exited.
    pub fn send_text(&self, text: &str) -> bool {
        self.sender.send(Message::Text(text.to_owned().into())).is_ok()
    }
}

/// Registry of all open sockets
///
/// Connection ids start at 0 and are never reused. A socket can be bound to
/// at most one player and a player to at most one socket.
pub struct ClientManager {
    /// Open sockets indexed by connection id
    clients: HashMap<u32, Client>,
    /// Next available connection id
    next_client_id: u32,
    /// Maximum number of concurrent sockets
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry accepting up to `max_clients` sockets.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 0,
            max_clients,
        }
    }

    /// Attempts to add a new socket
    ///
    /// Returns Some(connection_id) if successful, None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, sender: FrameSender) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Removes a socket and returns the player it was bound to.
    ///
    /// The caller is responsible for telling the simulation that the player
    /// disconnected; the registry only forgets the socket.
    pub fn remove_client(&mut self, client_id: u32) -> Option<u32> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} ({}) disconnected", client.id, client.addr);
        client.player_id
    }

    /// Binds a registered player to a socket. Returns false if the socket is
    /// unknown or already bound.
    pub fn bind_player(&mut self, client_id: u32, player_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.player_id.is_none() => {
                client.player_id = Some(player_id);
                true
            }
            _ => false,
        }
    }

    /// Player bound to a socket, or None if it has not registered yet
    pub fn player_for(&self, client_id: u32) -> Option<u32> {
        self.clients.get(&client_id).and_then(|c| c.player_id)
    }

    /// Looks up a socket by connection id.
    pub fn client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Looks up the socket a player registered through.
    ///
    /// This is a linear scan; the registry holds at most `max_clients`
    /// entries.
    pub fn client_for_player(&self, player_id: u32) -> Option<&Client> {
        self.clients
            .values()
            .find(|client| client.player_id == Some(player_id))
    }

    /// Queues a text frame on every socket.
    pub fn broadcast_text(&self, text: &str) {
        for client in self.clients.values() {
            client.send_text(text);
        }
    }

    /// Queues a text frame for the socket bound to `player_id`. Returns
    /// false if no such socket is open.
    pub fn send_to_player(&self, player_id: u32, text: &str) -> bool {
        self.client_for_player(player_id)
            .map_or(false, |client| client.send_text(text))
    }

    /// Number of open sockets
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn sender() -> (FrameSender, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    fn text_of(message: Message) -> String {
        match message {
            Message::Text(text) => text.to_string(),
            other => panic!("Unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        assert_eq!(manager.add_client(test_addr(), tx1), Some(0));
        assert_eq!(manager.add_client(test_addr2(), tx2), Some(1));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        assert!(manager.add_client(test_addr(), tx1).is_some());
        assert!(manager.add_client(test_addr2(), tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut manager = ClientManager::new(2);
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        let first = manager.add_client(test_addr(), tx1).unwrap();
        manager.remove_client(first);
        let second = manager.add_client(test_addr(), tx2).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_bind_player() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = sender();
        let client_id = manager.add_client(test_addr(), tx).unwrap();

        assert_eq!(manager.player_for(client_id), None);
        assert!(manager.bind_player(client_id, 7));
        assert!(!manager.bind_player(client_id, 8));
        assert_eq!(manager.player_for(client_id), Some(7));
        assert_eq!(manager.client_for_player(7).map(|c| c.id), Some(client_id));
        assert!(!manager.bind_player(99, 1));
    }

    #[test]
    fn test_remove_returns_bound_player() {
        let mut manager = ClientManager::new(2);
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();
        let bound = manager.add_client(test_addr(), tx1).unwrap();
        let unbound = manager.add_client(test_addr2(), tx2).unwrap();
        manager.bind_player(bound, 3);

        assert_eq!(manager.remove_client(bound), Some(3));
        assert_eq!(manager.remove_client(unbound), None);
        assert_eq!(manager.remove_client(unbound), None);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_broadcast_and_targeted_send() {
        let mut manager = ClientManager::new(2);
        let (tx1, mut rx1) = sender();
        let (tx2, mut rx2) = sender();
        let first = manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();
        manager.bind_player(first, 0);

        manager.broadcast_text("hello");
        assert_eq!(text_of(rx1.try_recv().unwrap()), "hello");
        assert_eq!(text_of(rx2.try_recv().unwrap()), "hello");

        assert!(manager.send_to_player(0, "only you"));
        assert!(!manager.send_to_player(5, "nobody"));
        assert_eq!(text_of(rx1.try_recv().unwrap()), "only you");
        assert!(rx2.try_recv().is_err());
    }
}
