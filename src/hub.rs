//! Live subscriber registry and notification fanout
//!
//! The hub is an explicit struct owned by the composition root and shared
//! by reference with every component that needs to notify. Each connection
//! registers an outbound channel sender; the transport layer relays the
//! received messages to actual client sockets. Delivery is best-effort:
//! a user with no live connection yields a logged `false`, never an error.
//!
//! Membership bookkeeping: a connection can join one per-user channel and
//! any number of per-location channels (2-decimal rounded keys). On
//! disconnect the handle is purged from every set it belonged to, and a
//! per-user set emptied by its last handle is removed entirely.

use crate::models::{Alert, LocationKey, distance_km};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Handle identifying one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// One outbound event for the transport layer to relay
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub event: String,
    pub payload: Value,
}

struct Connection {
    sender: mpsc::UnboundedSender<PushMessage>,
    user_id: Option<String>,
    locations: HashSet<LocationKey>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    users: HashMap<String, HashSet<ConnectionId>>,
    locations: HashMap<LocationKey, HashSet<ConnectionId>>,
}

/// Connection registry with per-user and per-location fanout
#[derive(Default)]
pub struct NotificationHub {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
}

impl NotificationHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its handle
    pub fn register(&self, sender: mpsc::UnboundedSender<PushMessage>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut registry = self.registry.write().unwrap();
        registry.connections.insert(
            id,
            Connection {
                sender,
                user_id: None,
                locations: HashSet::new(),
            },
        );
        info!("Client connected: {:?}", id);
        id
    }

    /// Join the per-user channel for this connection
    pub fn identify(&self, conn: ConnectionId, user_id: &str) {
        if user_id.is_empty() {
            return;
        }

        let mut registry = self.registry.write().unwrap();
        let Some(connection) = registry.connections.get_mut(&conn) else {
            return;
        };

        // Re-identification moves the handle out of its previous channel
        let previous = connection.user_id.replace(user_id.to_string());
        let confirmation = PushMessage {
            event: "identified".to_string(),
            payload: serde_json::json!({ "user_id": user_id, "status": "connected" }),
        };
        let _ = connection.sender.send(confirmation);

        if let Some(previous) = previous {
            remove_user_membership(&mut registry, &previous, conn);
        }
        registry
            .users
            .entry(user_id.to_string())
            .or_default()
            .insert(conn);
        info!("User identified: {} on {:?}", user_id, conn);
    }

    /// Join the rounded-location channel
    pub fn subscribe_location(&self, conn: ConnectionId, lat: f64, lon: f64) {
        let key = LocationKey::new(lat, lon);
        let mut registry = self.registry.write().unwrap();
        let Some(connection) = registry.connections.get_mut(&conn) else {
            return;
        };
        connection.locations.insert(key);
        registry.locations.entry(key).or_default().insert(conn);
        debug!("Subscribed {:?} to {}", conn, key.channel());
    }

    /// Leave the rounded-location channel
    pub fn unsubscribe_location(&self, conn: ConnectionId, lat: f64, lon: f64) {
        let key = LocationKey::new(lat, lon);
        let mut registry = self.registry.write().unwrap();
        if let Some(connection) = registry.connections.get_mut(&conn) {
            connection.locations.remove(&key);
        }
        remove_location_membership(&mut registry, key, conn);
    }

    /// Purge a connection from every channel it belonged to
    pub fn disconnect(&self, conn: ConnectionId) {
        let mut registry = self.registry.write().unwrap();
        let Some(connection) = registry.connections.remove(&conn) else {
            return;
        };
        if let Some(user_id) = connection.user_id {
            remove_user_membership(&mut registry, &user_id, conn);
        }
        for key in connection.locations {
            remove_location_membership(&mut registry, key, conn);
        }
        info!("Client disconnected: {:?}", conn);
    }

    /// Send an event to every live connection of one user.
    /// Returns false, with a warning log, when the user has no live
    /// recipient - delivery is best-effort.
    pub fn notify_user(&self, user_id: &str, event: &str, payload: Value) -> bool {
        let targets: Vec<ConnectionId> = {
            let registry = self.registry.read().unwrap();
            registry
                .users
                .get(user_id)
                .map(|conns| conns.iter().copied().collect())
                .unwrap_or_default()
        };

        let delivered = self.send_to(&targets, event, &payload);
        if delivered == 0 {
            warn!("No live connection for user {}, dropping {}", user_id, event);
            return false;
        }
        debug!("Notified user {} ({} connections)", user_id, delivered);
        true
    }

    /// Send an alert to every live connection unconditionally
    pub fn broadcast_alert(&self, alert: &Alert) -> usize {
        let targets: Vec<ConnectionId> = {
            let registry = self.registry.read().unwrap();
            registry.connections.keys().copied().collect()
        };
        let payload = serde_json::to_value(alert).unwrap_or(Value::Null);
        let delivered = self.send_to(&targets, "weather_alert", &payload);
        info!(
            "Broadcast alert {} ({}) to {} clients",
            alert.id, alert.severity, delivered
        );
        delivered
    }

    /// Send an event to one rounded-location channel
    pub fn notify_location(&self, lat: f64, lon: f64, event: &str, payload: Value) -> usize {
        let key = LocationKey::new(lat, lon);
        let targets: Vec<ConnectionId> = {
            let registry = self.registry.read().unwrap();
            registry
                .locations
                .get(&key)
                .map(|conns| conns.iter().copied().collect())
                .unwrap_or_default()
        };
        let delivered = self.send_to(&targets, event, &payload);
        debug!("Notified {} ({} connections)", key.channel(), delivered);
        delivered
    }

    /// Push fresh weather data to a location channel with a timestamp
    /// envelope
    pub fn broadcast_weather_update(&self, lat: f64, lon: f64, data: Value) -> usize {
        let payload = serde_json::json!({
            "location": { "lat": lat, "lon": lon },
            "data": data,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.notify_location(lat, lon, "weather_update", payload)
    }

    /// Send an event to every connection subscribed to a location within
    /// `radius_km` of the center. Returns the number of connections
    /// notified.
    pub fn notify_within_radius(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        event: &str,
        payload: Value,
    ) -> usize {
        let targets: Vec<ConnectionId> = {
            let registry = self.registry.read().unwrap();
            let mut in_range: HashSet<ConnectionId> = HashSet::new();
            for (key, conns) in &registry.locations {
                let d = distance_km(lat, lon, key.latitude(), key.longitude());
                if d <= radius_km {
                    in_range.extend(conns.iter().copied());
                }
            }
            in_range.into_iter().collect()
        };
        let delivered = self.send_to(&targets, event, &payload);
        info!(
            "Area notification at {:.2},{:.2} r={}km reached {} connections",
            lat, lon, radius_km, delivered
        );
        delivered
    }

    /// Count of users with at least one live connection
    #[must_use]
    pub fn connected_users(&self) -> usize {
        self.registry.read().unwrap().users.len()
    }

    /// Count of live connections
    #[must_use]
    pub fn connected_clients(&self) -> usize {
        self.registry.read().unwrap().connections.len()
    }

    /// Whether any connection is identified as this user
    #[must_use]
    pub fn has_user(&self, user_id: &str) -> bool {
        self.registry.read().unwrap().users.contains_key(user_id)
    }

    fn send_to(&self, targets: &[ConnectionId], event: &str, payload: &Value) -> usize {
        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();
        {
            let registry = self.registry.read().unwrap();
            for id in targets {
                let Some(connection) = registry.connections.get(id) else {
                    continue;
                };
                let message = PushMessage {
                    event: event.to_string(),
                    payload: payload.clone(),
                };
                if connection.sender.send(message).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }
        // A closed receiver means the transport went away without an
        // explicit disconnect
        for id in dead {
            debug!("Pruning dead connection {:?}", id);
            self.disconnect(id);
        }
        delivered
    }
}

fn remove_user_membership(registry: &mut Registry, user_id: &str, conn: ConnectionId) {
    if let Some(conns) = registry.users.get_mut(user_id) {
        conns.remove(&conn);
        if conns.is_empty() {
            registry.users.remove(user_id);
        }
    }
}

fn remove_location_membership(registry: &mut Registry, key: LocationKey, conn: ConnectionId) {
    if let Some(conns) = registry.locations.get_mut(&key) {
        conns.remove(&conn);
        if conns.is_empty() {
            registry.locations.remove(&key);
        }
    }
}
