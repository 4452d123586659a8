use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Checking,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Checking => "Checking Connection",
            ConnectionStatus::Connected => "Backend Connected",
            ConnectionStatus::Disconnected => "Backend Disconnected",
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == ConnectionStatus::Connected
    }
}

/// Backend reachability as last observed, plus when to look again
#[derive(Debug, Clone)]
pub struct ConnectionIndicator {
    status: ConnectionStatus,
    last_checked: Option<DateTime<Utc>>,
    interval: Duration,
    in_flight: bool,
}

impl ConnectionIndicator {
    pub fn new(interval: Duration) -> Self {
        Self {
            status: ConnectionStatus::Checking,
            last_checked: None,
            interval,
            in_flight: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn label(&self) -> &'static str {
        self.status.label()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_checking(&self) -> bool {
        self.in_flight
    }

    /// Whether a periodic check should start now.
    ///
    /// Due immediately on mount, then once per interval after each completed
    /// check. Never due while a check is running.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_checked {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last);
                elapsed.to_std().map(|e| e >= self.interval).unwrap_or(false)
            }
        }
    }

    /// Mark a check as started. Returns false if one is already running.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        self.status = ConnectionStatus::Checking;
        true
    }

    pub fn record(&mut self, healthy: bool, at: DateTime<Utc>) {
        self.in_flight = false;
        self.status = if healthy {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        self.last_checked = Some(at);
    }
}
