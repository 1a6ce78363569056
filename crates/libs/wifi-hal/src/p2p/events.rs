use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{MacAddress, OuiKeyedData, P2pConfig, P2pDevice, P2pGroup, P2pStatus, ProvDiscStatus};

/// What a provision discovery asks of the local user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvDiscKind {
    PbcRequest,
    PbcResponse,
    EnterPin,
    ShowPin,
    PairingOpportunisticRequest,
    PairingOpportunisticResponse,
    PairingEnterPin,
    PairingShowPin,
    PairingEnterPassphrase,
    PairingShowPassphrase,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvDiscEvent {
    pub kind: ProvDiscKind,
    pub device: MacAddress,
    pub pin: Option<String>,
    pub is_comeback: bool,
    pub vendor_data: Vec<OuiKeyedData>,
}

/// A decoded P2P notification from the supplicant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum P2pEvent {
    DeviceFound(P2pDevice),
    DeviceLost(MacAddress),
    FindStopped,
    GoNegotiationRequest(P2pConfig),
    GoNegotiationSuccess,
    GoNegotiationFailure(P2pStatus),
    GroupFormationSuccess,
    GroupFormationFailure(String),
    GroupStarted(P2pGroup),
    GroupRemoved(P2pGroup),
    InvitationReceived(P2pGroup),
    InvitationResult(P2pStatus),
    ProvisionDiscovery(ProvDiscEvent),
    ProvisionDiscoveryFailure {
        status: ProvDiscStatus,
        device: Option<MacAddress>,
    },
    ServiceDiscoveryResponse {
        source: MacAddress,
        tlvs: Vec<u8>,
    },
    ApStaConnected(P2pDevice),
    ApStaDisconnected(P2pDevice),
    FrequencyChanged(i32),
}

/// Sink for decoded events, keyed by the interface the callback was registered on.
pub trait P2pMonitor: Send + Sync {
    fn broadcast(&self, iface: &str, event: P2pEvent);
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct P2pMonitorEvent {
    pub iface: String,
    pub event: P2pEvent,
}

/// Fans events out to any number of subscribers over a tokio broadcast channel.
pub struct BroadcastP2pMonitor {
    tx: broadcast::Sender<P2pMonitorEvent>,
}

impl BroadcastP2pMonitor {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<P2pMonitorEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastP2pMonitor {
    fn default() -> Self {
        Self::new(256)
    }
}

impl P2pMonitor for BroadcastP2pMonitor {
    fn broadcast(&self, iface: &str, event: P2pEvent) {
        log::trace!("p2p-monitor({iface}): {event:?}");
        // No subscribers is not an error; the event is simply dropped.
        let _ = self.tx.send(P2pMonitorEvent {
            iface: iface.to_string(),
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let monitor = BroadcastP2pMonitor::new(8);
        let mut rx = monitor.subscribe();

        monitor.broadcast("p2p0", P2pEvent::FindStopped);
        monitor.broadcast("p2p0", P2pEvent::FrequencyChanged(2437));

        let first = rx.recv().await.expect("first event");
        assert_eq!(first.iface, "p2p0");
        assert_eq!(first.event, P2pEvent::FindStopped);
        let second = rx.recv().await.expect("second event");
        assert_eq!(second.event, P2pEvent::FrequencyChanged(2437));
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let monitor = BroadcastP2pMonitor::default();
        monitor.broadcast("p2p0", P2pEvent::GroupFormationSuccess);
    }
}
