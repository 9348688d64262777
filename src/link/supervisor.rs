//! Link supervisor
//!
//! Owns the network interface and the `wifi_is_connected` flag. A periodic
//! checker notices a lost link by polling the adapter and runs `reconnect`,
//! which retries until the interface reports a connection. There is no timeout:
//! an unattended unit prefers eventual connectivity.

use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, trace};

use super::adapter::LinkAdapter;
use crate::config::WifiSettings;
use crate::flags::{FlagReader, FlagWriter, flag};
use crate::scheduler::pace;
use crate::utils::error::RestartReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
}

pub struct LinkSupervisor<A> {
    adapter: A,
    ssid: String,
    password: String,
    link_up: FlagWriter,
    reconnecting: AtomicBool,
    address: Mutex<Option<IpAddr>>,
    check_interval: Duration,
    granularity: Duration,
}

impl<A: LinkAdapter> LinkSupervisor<A> {
    pub fn new(adapter: A, settings: &WifiSettings, granularity: Duration) -> Self {
        Self {
            adapter,
            ssid: settings.ssid.clone(),
            password: settings.password.clone(),
            link_up: flag("wifi_is_connected"),
            reconnecting: AtomicBool::new(false),
            address: Mutex::new(None),
            check_interval: settings.check_interval(),
            granularity,
        }
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up.get()
    }

    pub fn state(&self) -> LinkState {
        if self.is_link_up() {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }

    /// Observable `wifi_is_connected` flag for other components.
    pub fn link_flag(&self) -> FlagReader {
        self.link_up.reader()
    }

    /// Address recorded by the last successful reconnect.
    pub fn address(&self) -> Option<IpAddr> {
        *self.address.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Bring the link up, waiting as long as it takes.
    ///
    /// A call while another reconnect is in progress returns immediately.
    pub async fn reconnect(&self) {
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            trace!("reconnect already in progress");
            return;
        }
        self.link_up.set(false);

        info!(ssid = %self.ssid, "connecting to network");
        self.adapter.activate();
        self.adapter.connect(&self.ssid, &self.password);
        while !self.adapter.is_connected() {
            pace(self.granularity).await;
        }

        let address = self.adapter.address();
        *self.address.lock().unwrap_or_else(PoisonError::into_inner) = address;
        info!(ssid = %self.ssid, ip = ?address, "network connection established");

        self.link_up.set(true);
        self.reconnecting.store(false, Ordering::Release);
    }

    /// Connection checker loop: every interval, reconnect if the adapter lost the
    /// link or the link flag is not up yet. An adapter that is already connected
    /// goes straight through `reconnect` and raises the flag.
    pub async fn run(&self) -> Result<Infallible, RestartReason> {
        loop {
            let link_lost = !self.adapter.is_connected() || !self.link_up.get();
            if link_lost && !self.reconnecting.load(Ordering::Acquire) {
                self.reconnect().await;
            }
            tokio::time::sleep(self.check_interval).await;
        }
    }
}
