//! Alert store and monitored-entity directory seams
//!
//! The relational store lives outside this crate; these traits specify the
//! contract the core depends on - append/update of alert records with
//! fingerprint uniqueness, lifecycle stamps, query-by-user retrieval, and
//! the active-location queries the scheduler polls. `MemoryStore`
//! implements both traits for tests and standalone runs.

use crate::Result;
use crate::models::{Alert, AlertFingerprint, Location, LocationKey, SeverityLevel};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// An in-flight tracked entity whose destination is monitored for weather
#[derive(Debug, Clone)]
pub struct ActiveOrder {
    pub id: String,
    pub customer_id: String,
    pub provider_id: Option<String>,
    pub destination: Location,
}

/// Pagination and filtering for per-user alert queries
#[derive(Debug, Clone)]
pub struct UserAlertQuery {
    pub limit: usize,
    pub offset: usize,
    /// Some(true) = acknowledged only, Some(false) = unacknowledged only
    pub acknowledged: Option<bool>,
}

impl Default for UserAlertQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            acknowledged: None,
        }
    }
}

/// Alert record persistence
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Append a new alert record
    async fn insert_alert(&self, alert: Alert) -> Result<()>;

    /// Find an alert matching the fingerprint whose validity window is
    /// still open at `now` and which has not been acknowledged
    async fn find_open_alert(
        &self,
        fingerprint: &AlertFingerprint,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>>;

    /// Stamp delivery time; returns false for unknown ids
    async fn mark_delivered(&self, alert_id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Set the acknowledgement stamp. Returns false - a benign outcome,
    /// not an error - when the alert is unknown, belongs to another user,
    /// or is already acknowledged. The stamp is write-once.
    async fn acknowledge(&self, alert_id: &str, user_id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Attach or overwrite feedback; false for unknown id or wrong user
    async fn set_feedback(
        &self,
        alert_id: &str,
        user_id: &str,
        rating: u8,
        text: Option<String>,
    ) -> Result<bool>;

    /// Alerts for a user, newest first
    async fn alerts_for_user(&self, user_id: &str, query: UserAlertQuery) -> Result<Vec<Alert>>;

    /// Delete alerts older than `horizon` that are acknowledged or below
    /// `severity_floor`; unacknowledged high-severity alerts are retained.
    /// Returns the number deleted.
    async fn purge_expired(
        &self,
        horizon: Duration,
        severity_floor: SeverityLevel,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    /// Distinct rounded locations of alerts created within `window`
    async fn recent_alert_locations(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<LocationKey>>;
}

/// Read access to the monitored-entity directory
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    /// In-flight orders needing per-party weather checks, bounded
    async fn active_orders(&self, limit: usize) -> Result<Vec<ActiveOrder>>;

    /// Distinct rounded destination locations of in-flight orders, bounded
    async fn active_locations(&self, limit: usize) -> Result<Vec<LocationKey>>;
}

/// In-memory store backing tests and standalone runs
#[derive(Default)]
pub struct MemoryStore {
    alerts: RwLock<HashMap<String, Alert>>,
    orders: RwLock<Vec<ActiveOrder>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active order (test and standalone seeding)
    pub async fn add_order(&self, order: ActiveOrder) {
        self.orders.write().await.push(order);
    }

    pub async fn alert_count(&self) -> usize {
        self.alerts.read().await.len()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: Alert) -> Result<()> {
        self.alerts.write().await.insert(alert.id.clone(), alert);
        Ok(())
    }

    async fn find_open_alert(
        &self,
        fingerprint: &AlertFingerprint,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let alerts = self.alerts.read().await;
        let found = alerts
            .values()
            .filter(|a| a.is_open_at(now) && &a.fingerprint() == fingerprint)
            .max_by_key(|a| a.created_at)
            .cloned();
        Ok(found)
    }

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        Ok(self.alerts.read().await.get(alert_id).cloned())
    }

    async fn mark_delivered(&self, alert_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        match alerts.get_mut(alert_id) {
            Some(alert) => {
                alert.delivered_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn acknowledge(&self, alert_id: &str, user_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        match alerts.get_mut(alert_id) {
            Some(alert) if alert.user_id == user_id && alert.acknowledged_at.is_none() => {
                alert.acknowledged_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_feedback(
        &self,
        alert_id: &str,
        user_id: &str,
        rating: u8,
        text: Option<String>,
    ) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        match alerts.get_mut(alert_id) {
            Some(alert) if alert.user_id == user_id => {
                alert.feedback_rating = Some(rating);
                alert.feedback_text = text;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn alerts_for_user(&self, user_id: &str, query: UserAlertQuery) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut matching: Vec<Alert> = alerts
            .values()
            .filter(|a| a.user_id == user_id)
            .filter(|a| match query.acknowledged {
                Some(true) => a.acknowledged_at.is_some(),
                Some(false) => a.acknowledged_at.is_none(),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn purge_expired(
        &self,
        horizon: Duration,
        severity_floor: SeverityLevel,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let cutoff = now - horizon;
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|_, a| {
            let reapable = a.acknowledged_at.is_some() || a.severity < severity_floor;
            !(a.created_at < cutoff && reapable)
        });
        Ok(before - alerts.len())
    }

    async fn recent_alert_locations(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<LocationKey>> {
        let cutoff = Utc::now() - window;
        let alerts = self.alerts.read().await;
        let mut keys: Vec<LocationKey> = Vec::new();
        for alert in alerts.values() {
            if alert.created_at >= cutoff {
                let key = alert.location.grid_key();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            if keys.len() >= limit {
                break;
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl OrderDirectory for MemoryStore {
    async fn active_orders(&self, limit: usize) -> Result<Vec<ActiveOrder>> {
        Ok(self.orders.read().await.iter().take(limit).cloned().collect())
    }

    async fn active_locations(&self, limit: usize) -> Result<Vec<LocationKey>> {
        let orders = self.orders.read().await;
        let mut keys: Vec<LocationKey> = Vec::new();
        for order in orders.iter() {
            let key = order.destination.grid_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
            if keys.len() >= limit {
                break;
            }
        }
        Ok(keys)
    }
}
