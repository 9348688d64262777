//! The `unit` module wires every component of the aeroponics unit together and
//! hosts the two small timers that consume the core: the periodic status
//! updater and the irrigation cycle.
//!
//! Data flows link supervisor -> session manager -> inbound queue ->
//! dispatcher -> outbound queue -> session manager -> broker.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::flags::FlagReader;
use crate::link::{LinkAdapter, LinkSupervisor};
use crate::modules::{
    Actuator, Ds18b20, MemoryPin, ModuleRegistry, OutputPin, Relay, SysfsPin,
};
use crate::persistence::StateStore;
use crate::queue::MessageQueue;
use crate::scheduler::{Reclaim, RunLoop, TaskResult, reclamation_loop};
use crate::session::{BrokerConnector, SessionManager, SessionOptions};
use crate::utils::error::{RestartReason, SetupError};

/// The modules of the unit and the handles the timers need.
pub struct Hardware {
    pub modules: ModuleRegistry,
    pub irrigation: Arc<Relay>,
    pub reclaimers: Vec<Arc<dyn Reclaim>>,
}

impl Hardware {
    /// Sysfs GPIO relays, the w1 water temperature probe and, if configured, the
    /// growlight state store.
    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        let hw = &settings.hardware;
        let growlight = open_pin(&settings.hardware.gpio_path, hw.growlight_pin)?;
        let irrigation = open_pin(&settings.hardware.gpio_path, hw.irrigation_pin)?;
        let store = hw
            .growlight_state_path
            .as_ref()
            .map(StateStore::open)
            .transpose()?;
        Self::assemble(settings, growlight, irrigation, store)
    }

    /// In-memory pins and a temporary state store, for running off the device.
    pub fn simulated(settings: &Settings) -> Result<Self, SetupError> {
        let store = StateStore::temporary()?;
        Self::assemble(settings, MemoryPin::new(), MemoryPin::new(), Some(store))
    }

    fn assemble(
        settings: &Settings,
        growlight_pin: impl OutputPin + 'static,
        irrigation_pin: impl OutputPin + 'static,
        store: Option<StateStore>,
    ) -> Result<Self, SetupError> {
        let hw = &settings.hardware;
        let growlight = match store.clone() {
            Some(store) => {
                Relay::persisted("growlight", growlight_pin, hw.growlight_active_high, store)?
            }
            None => Relay::new("growlight", growlight_pin, hw.growlight_active_high)?,
        };
        let irrigation = Arc::new(Relay::new(
            "irrigation",
            irrigation_pin,
            hw.irrigation_active_high,
        )?);
        let water_temperature = Ds18b20::new(
            &hw.water_temp_sensor_name,
            hw.w1_devices_path.clone(),
            Duration::from_millis(hw.sensor_settle_ms),
        );

        let modules = ModuleRegistry::new()
            .with_sensor(Arc::new(water_temperature))
            .with_actuator(Arc::new(growlight), true)
            .with_actuator(irrigation.clone(), false);
        let reclaimers = store
            .into_iter()
            .map(|store| Arc::new(store) as Arc<dyn Reclaim>)
            .collect();

        Ok(Self {
            modules,
            irrigation,
            reclaimers,
        })
    }
}

fn open_pin(gpio_root: &std::path::Path, pin: u32) -> Result<SysfsPin, SetupError> {
    SysfsPin::open(gpio_root, pin).map_err(|source| SetupError::Pin { pin, source })
}

pub struct Unit<A: LinkAdapter, C: BrokerConnector> {
    settings: Settings,
    link: Arc<LinkSupervisor<A>>,
    session: Arc<SessionManager<C>>,
    dispatcher: Arc<Dispatcher>,
    irrigation: Arc<Relay>,
    reclaimers: Vec<Arc<dyn Reclaim>>,
}

impl<A: LinkAdapter, C: BrokerConnector> Unit<A, C> {
    pub fn new(settings: Settings, adapter: A, connector: C, hardware: Hardware) -> Self {
        let granularity = settings.schedule.yield_granularity();
        let inbound = Arc::new(MessageQueue::new("inbound", settings.mqtt.queue_size));
        let outbound = Arc::new(MessageQueue::new("outbound", settings.mqtt.queue_size));

        let link = Arc::new(LinkSupervisor::new(adapter, &settings.wifi, granularity));
        let session = Arc::new(SessionManager::new(
            connector,
            SessionOptions::from_settings(&settings),
            link.link_flag(),
            inbound.clone(),
            outbound.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            &settings,
            hardware.modules,
            inbound,
            outbound,
        ));

        Self {
            settings,
            link,
            session,
            dispatcher,
            irrigation: hardware.irrigation,
            reclaimers: hardware.reclaimers,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn link(&self) -> &Arc<LinkSupervisor<A>> {
        &self.link
    }

    pub fn session(&self) -> &Arc<SessionManager<C>> {
        &self.session
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Host every task of the unit on a run-loop, ready to be driven.
    pub fn into_run_loop(self) -> RunLoop {
        let schedule = &self.settings.schedule;
        let mut run_loop = RunLoop::new();

        let link = self.link.clone();
        run_loop.spawn("link-checker", async move { link.run().await });

        let session = self.session.clone();
        run_loop.spawn("session-checker", async move {
            session.connection_checker().await
        });
        let session = self.session.clone();
        run_loop.spawn("outbound-drain", async move { session.outbound_drain().await });
        let session = self.session.clone();
        run_loop.spawn("inbound-poll", async move { session.inbound_poll().await });

        let dispatcher = self.dispatcher.clone();
        run_loop.spawn("dispatcher", async move { dispatcher.run().await });

        run_loop.spawn(
            "status-updater",
            status_updater_loop(
                self.dispatcher.clone(),
                self.session.connected_flag(),
                Duration::from_secs(schedule.post_status_interval_sec),
            ),
        );
        run_loop.spawn(
            "irrigation",
            irrigation_loop(
                self.irrigation.clone(),
                Duration::from_secs(schedule.irrigation_on_sec),
                Duration::from_secs(schedule.irrigation_off_sec),
            ),
        );
        run_loop.spawn(
            "reclamation",
            reclamation_loop(
                self.reclaimers.clone(),
                Duration::from_secs(schedule.reclaim_interval_sec),
            ),
        );
        run_loop
    }

    /// Run the unit until something calls for a restart.
    pub async fn run(self) -> RestartReason {
        info!(unit = %self.settings.unit.unit_id(), "starting unit");
        self.into_run_loop().run().await
    }
}

impl<A: LinkAdapter, C: BrokerConnector> std::fmt::Debug for Unit<A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("unit_id", &self.settings.unit.unit_id())
            .field("link", &self.link.state())
            .field("session", &self.session.state())
            .finish()
    }
}

/// Send a status snapshot every `interval`, waiting for a broker session first.
pub async fn status_updater_loop(
    dispatcher: Arc<Dispatcher>,
    connected: FlagReader,
    interval: Duration,
) -> TaskResult {
    loop {
        connected.wait_for(true).await;
        dispatcher.send_status().await;
        tokio::time::sleep(interval).await;
    }
}

/// Irrigation cycle: on for `on`, off for `off`, forever.
pub async fn irrigation_loop(relay: Arc<dyn Actuator>, on: Duration, off: Duration) -> TaskResult {
    loop {
        if let Err(e) = relay.switch(true) {
            warn!(module = relay.module_id(), "irrigation on failed: {e}");
        }
        tokio::time::sleep(on).await;
        if let Err(e) = relay.switch(false) {
            warn!(module = relay.module_id(), "irrigation off failed: {e}");
        }
        tokio::time::sleep(off).await;
    }
}
