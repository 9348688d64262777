//! Connectivity flags
//!
//! `wifi_is_connected` and `mqtt_is_connected` are the single source of truth
//! other components poll before doing network work. Each flag has exactly one
//! writer: the `FlagWriter` is not `Clone`, so only the component that owns it
//! (the link supervisor or the session manager) can change the value. Readers get
//! a cheap `FlagReader` that can also wait for a value.

use tokio::sync::watch;
use tracing::{debug, trace};

/// Create a flag, initially `false`. The writer goes to the owning component.
pub fn flag(name: &'static str) -> FlagWriter {
    let (sender, _) = watch::channel(false);
    FlagWriter { name, sender }
}

#[derive(Debug)]
pub struct FlagWriter {
    name: &'static str,
    sender: watch::Sender<bool>,
}

impl FlagWriter {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set the flag. Readers are only woken when the value actually changes.
    pub fn set(&self, value: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            debug!(flag = self.name, value, "flag changed");
        }
    }

    pub fn get(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn reader(&self) -> FlagReader {
        FlagReader {
            name: self.name,
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlagReader {
    name: &'static str,
    receiver: watch::Receiver<bool>,
}

impl FlagReader {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Suspend until the flag equals `value`. Returns immediately if it already does.
    ///
    /// Returns `false` if the writer is gone and the value can no longer change.
    pub async fn wait_for(&self, value: bool) -> bool {
        let mut receiver = self.receiver.clone();
        match receiver.wait_for(|current| *current == value).await {
            Ok(_) => true,
            Err(_) => {
                trace!(flag = self.name, "flag writer dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests;
