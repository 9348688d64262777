//! Relay actuator
//!
//! A relay is wired either active-high or active-low. Its logical state is
//! `1` (on) or `0` (off) regardless of wiring. A relay built with a
//! `StateStore` restores its last state on construction and records every change.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::gpio::OutputPin;
use super::{Actuator, module_ref};
use crate::persistence::StateStore;
use crate::utils::error::ModuleError;

pub struct Relay {
    id: String,
    active_high: bool,
    pin: Mutex<Box<dyn OutputPin>>,
    state: AtomicU8,
    store: Option<StateStore>,
}

impl Relay {
    /// A relay that starts switched off.
    pub fn new(
        name: &str,
        pin: impl OutputPin + 'static,
        active_high: bool,
    ) -> Result<Self, ModuleError> {
        let relay = Self::build(name, pin, active_high, None);
        relay.relay_off()?;
        Ok(relay)
    }

    /// A relay whose state is restored from and saved to `store`.
    ///
    /// A missing or invalid stored state switches the relay off.
    pub fn persisted(
        name: &str,
        pin: impl OutputPin + 'static,
        active_high: bool,
        store: StateStore,
    ) -> Result<Self, ModuleError> {
        let relay = Self::build(name, pin, active_high, Some(store.clone()));
        match store.load_state(&relay.id) {
            Ok(Some(stored)) => {
                info!(module = %relay.id, state = stored.state, "restoring relay state");
                if relay.set_state(stored.state).is_err() {
                    warn!(module = %relay.id, state = stored.state, "unrecognized stored relay state");
                    relay.relay_off()?;
                }
            }
            Ok(None) => {
                info!(module = %relay.id, "no persisted state exists yet");
                relay.relay_off()?;
            }
            Err(e) => {
                warn!(module = %relay.id, "failed to load relay state: {e}");
                relay.relay_off()?;
            }
        }
        Ok(relay)
    }

    fn build(
        name: &str,
        pin: impl OutputPin + 'static,
        active_high: bool,
        store: Option<StateStore>,
    ) -> Self {
        Self {
            id: module_ref("relay", name),
            active_high,
            pin: Mutex::new(Box::new(pin)),
            state: AtomicU8::new(0),
            store,
        }
    }

    pub fn state(&self) -> u8 {
        self.state.load(Ordering::SeqCst)
    }

    pub fn relay_on(&self) -> Result<(), ModuleError> {
        self.drive(true)
    }

    pub fn relay_off(&self) -> Result<(), ModuleError> {
        self.drive(false)
    }

    pub fn set_state(&self, state: u8) -> Result<(), ModuleError> {
        match state {
            1 => self.relay_on(),
            0 => self.relay_off(),
            other => Err(ModuleError::InvalidInput {
                module: self.id.clone(),
                value: other.to_string(),
            }),
        }
    }

    fn drive(&self, on: bool) -> Result<(), ModuleError> {
        let level = on == self.active_high;
        self.pin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_level(level)
            .map_err(|source| ModuleError::Hardware {
                module: self.id.clone(),
                source,
            })?;

        let state = u8::from(on);
        self.state.store(state, Ordering::SeqCst);
        debug!(module = %self.id, state, "relay switched");

        if let Some(store) = &self.store {
            if let Err(e) = store.store_state(&self.id, state) {
                warn!(module = %self.id, "failed to persist relay state: {e}");
            }
        }
        Ok(())
    }
}

impl Actuator for Relay {
    fn module_id(&self) -> &str {
        &self.id
    }

    fn switch(&self, on: bool) -> Result<(), ModuleError> {
        self.drive(on)
    }

    fn current_state(&self) -> (String, u8) {
        (self.id.clone(), self.state())
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("id", &self.id)
            .field("active_high", &self.active_high)
            .field("state", &self.state())
            .field("persisted", &self.store.is_some())
            .finish()
    }
}
