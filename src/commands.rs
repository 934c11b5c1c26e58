//! User-initiated device commands.
//!
//! A device is marked busy for exactly as long as its command is in flight.
//! The mark is held by a guard, so it is released on every exit path,
//! including early returns and panics inside the commander.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::client::{DeviceCommander, FetchError};
use crate::dashboard::{Dashboard, Notification, NotificationKind};
use crate::models::{Device, DeviceAction};

// ---

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0} already has a command in flight")]
    Busy(Device),

    #[error("failed to turn {device} {action}: {source}")]
    Failed {
        device: Device,
        action: DeviceAction,
        #[source]
        source: FetchError,
    },
}

/// Result of a successful command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    // ---
    pub device: Device,
    pub action: DeviceAction,
    pub message: String,
    /// Whatever the API returned as acknowledgement.
    pub ack: Value,
}

type BusySet = Arc<Mutex<HashSet<Device>>>;

/// Marks one device busy until dropped.
struct BusyGuard {
    device: Device,
    busy: BusySet,
}

impl BusyGuard {
    fn acquire(busy: &BusySet, device: Device) -> Option<Self> {
        // ---
        let mut set = busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(device) {
            return None;
        }
        Some(Self {
            device,
            busy: Arc::clone(busy),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.device);
    }
}

/// Sends device commands and reports their outcome to the dashboard.
#[derive(Clone)]
pub struct DeviceControl {
    // ---
    commander: Arc<dyn DeviceCommander>,
    dashboard: Dashboard,
    busy: BusySet,
    notification_ttl: Duration,
}

impl DeviceControl {
    pub fn new(
        commander: Arc<dyn DeviceCommander>,
        dashboard: Dashboard,
        notification_ttl: Duration,
    ) -> Self {
        Self {
            commander,
            dashboard,
            busy: Arc::default(),
            notification_ttl,
        }
    }

    pub fn is_busy(&self, device: Device) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&device)
    }

    /// Devices with a command in flight, in stable order.
    pub fn busy_devices(&self) -> Vec<Device> {
        // ---
        let set = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        [Device::Pump, Device::Spray]
            .into_iter()
            .filter(|d| set.contains(d))
            .collect()
    }

    /// Send one command. Rejected without touching the API if the device is busy.
    pub async fn execute(
        &self,
        device: Device,
        action: DeviceAction,
    ) -> Result<CommandOutcome, CommandError> {
        // ---
        let _guard = BusyGuard::acquire(&self.busy, device).ok_or(CommandError::Busy(device))?;
        info!(%device, %action, "Sending device command");

        match self.commander.send(device, action).await {
            Ok(ack) => {
                let message = format!(
                    "{} turned {}",
                    capitalize(device.as_str()),
                    action.as_str().to_uppercase()
                );
                info!(%device, %action, ack = %ack, "{}", message);
                self.notify(NotificationKind::Success, device, action, message.clone())
                    .await;
                Ok(CommandOutcome {
                    device,
                    action,
                    message,
                    ack,
                })
            }
            Err(source) => {
                error!(%device, %action, "Error controlling {}: {}", device, source);
                let message = format!("Failed to control {device}: {source}");
                self.notify(NotificationKind::Error, device, action, message)
                    .await;
                Err(CommandError::Failed {
                    device,
                    action,
                    source,
                })
            }
        }
    }

    async fn notify(
        &self,
        kind: NotificationKind,
        device: Device,
        action: DeviceAction,
        message: String,
    ) {
        let ttl = self.notification_ttl;
        self.dashboard
            .notify(Notification::new(kind, device, action, message, ttl))
            .await;
    }
}

fn capitalize(s: &str) -> String {
    // ---
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
