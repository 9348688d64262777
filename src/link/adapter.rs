use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, warn};

/// The physical network interface as seen by the link supervisor.
///
/// Every method is a short synchronous step; the supervisor does the waiting.
pub trait LinkAdapter: Send + Sync + 'static {
    /// Power up the interface.
    fn activate(&self);

    /// Ask the interface to associate with `ssid`. Association proceeds in the
    /// background; progress is observed through `is_connected`.
    fn connect(&self, ssid: &str, password: &str);

    fn is_connected(&self) -> bool;

    /// Address assigned to the interface, if any.
    fn address(&self) -> Option<IpAddr>;
}

/// Link adapter for a host whose network is managed by the operating system.
///
/// The link counts as up when the kernel has a route towards `probe_addr` from a
/// configured address. Routing a UDP socket sends no packets.
#[derive(Debug)]
pub struct HostLink {
    probe_addr: String,
}

impl HostLink {
    pub fn new(probe_addr: impl Into<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
        }
    }

    fn routed_address(&self) -> Option<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect(&self.probe_addr).ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    }
}

impl LinkAdapter for HostLink {
    fn activate(&self) {
        debug!("host link is managed by the operating system");
    }

    fn connect(&self, ssid: &str, _password: &str) {
        if self.routed_address().is_none() {
            warn!(ssid, probe = %self.probe_addr, "no route to probe address yet");
        }
    }

    fn is_connected(&self) -> bool {
        self.routed_address().is_some()
    }

    fn address(&self) -> Option<IpAddr> {
        self.routed_address()
    }
}

/// A link adapter driven by hand. Used by `simulate` and by tests.
///
/// The access point is either in range or not (`set_available`). Once a connect
/// request was made the adapter stays associated whenever the access point is in
/// range, like a station interface that keeps retrying in the background.
#[derive(Debug, Clone, Default)]
pub struct ManualLink {
    state: Arc<ManualLinkState>,
}

#[derive(Debug, Default)]
struct ManualLinkState {
    available: AtomicBool,
    requested: AtomicBool,
    activations: AtomicUsize,
    connect_requests: AtomicUsize,
}

impl ManualLink {
    /// An adapter whose access point is in range from the start.
    pub fn available() -> Self {
        let link = Self::default();
        link.set_available(true);
        link
    }

    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    pub fn activations(&self) -> usize {
        self.state.activations.load(Ordering::SeqCst)
    }

    pub fn connect_requests(&self) -> usize {
        self.state.connect_requests.load(Ordering::SeqCst)
    }
}

impl LinkAdapter for ManualLink {
    fn activate(&self) {
        self.state.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn connect(&self, _ssid: &str, _password: &str) {
        self.state.connect_requests.fetch_add(1, Ordering::SeqCst);
        self.state.requested.store(true, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst) && self.state.available.load(Ordering::SeqCst)
    }

    fn address(&self) -> Option<IpAddr> {
        self.is_connected()
            .then_some(IpAddr::V4(Ipv4Addr::new(192, 168, 4, 2)))
    }
}
