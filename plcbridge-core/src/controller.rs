//! The adaptive poll controller and its lifecycle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use plcbridge_types::{current_timestamp_ms, Position, Role, Sample, SampleRecord};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::collab::{LocationSource, Publisher, Sampler, SubscriptionHandle};
use crate::command::{CommandHandler, COMMAND_TOPIC};
use crate::error::{BridgeError, Result};
use crate::history::{on_blocking_pool, HistoryStore};
use crate::location::resolve_position;
use crate::register::RegisterAggregator;
use crate::settings::BridgeConfig;
use crate::timing::PollTiming;
use crate::watchdog::Watchdog;

const STATUS_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle of a [`PollController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Connecting,
    Running,
    Stopping,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives the sample → aggregate → persist → publish cycle.
///
/// One controller exists per process. It owns the shared state (timing,
/// registers, history, watchdog) and hands clones of it to the consumer
/// tasks for status notifications and commands.
///
/// # Example
///
/// ```rust,ignore
/// let controller = Arc::new(PollController::new(config, sampler, publisher, location)?);
/// controller.start().await?;
/// tokio::signal::ctrl_c().await?;
/// controller.stop().await?;
/// ```
#[derive(Debug)]
pub struct PollController {
    config: Arc<BridgeConfig>,
    sampler: Arc<dyn Sampler>,
    publisher: Arc<dyn Publisher>,
    location: Arc<dyn LocationSource>,
    timing: Arc<PollTiming>,
    registers: Arc<RegisterAggregator>,
    history: Option<Arc<HistoryStore>>,
    watchdog: Arc<Watchdog>,
    state: Mutex<LifecycleState>,
    stop_tx: watch::Sender<bool>,
    /// Held for the duration of one cycle.
    cycle_guard: tokio::sync::Mutex<()>,
    runner: Mutex<Option<JoinHandle<()>>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl PollController {
    /// Build a controller, opening the history store if persistence is on.
    pub fn new(
        config: BridgeConfig,
        sampler: Arc<dyn Sampler>,
        publisher: Arc<dyn Publisher>,
        location: Arc<dyn LocationSource>,
    ) -> Result<Self> {
        let history = config
            .history
            .as_ref()
            .map(|history| HistoryStore::from_config(history).map(Arc::new))
            .transpose()?;
        let timing = Arc::new(PollTiming::new(config.normal_interval, config.fast_interval));
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            sampler,
            publisher,
            location,
            watchdog: Arc::new(Watchdog::new(timing.clone())),
            timing,
            registers: Arc::new(RegisterAggregator::new()),
            history,
            state: Mutex::new(LifecycleState::Stopped),
            stop_tx,
            cycle_guard: tokio::sync::Mutex::new(()),
            runner: Mutex::new(None),
            consumers: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn timing(&self) -> &Arc<PollTiming> {
        &self.timing
    }

    pub fn registers(&self) -> &Arc<RegisterAggregator> {
        &self.registers
    }

    pub fn history(&self) -> Option<&Arc<HistoryStore>> {
        self.history.as_ref()
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Override the current poll interval until the next cadence switch.
    pub fn set_interval(&self, interval: std::time::Duration) {
        self.timing.set_interval(interval);
    }

    /// A command handler sharing this controller's state.
    pub fn command_handler(&self) -> CommandHandler {
        CommandHandler::new(
            self.timing.clone(),
            self.registers.clone(),
            self.history.clone(),
            self.publisher.clone(),
        )
    }

    /// Connect the collaborators, subscribe, and begin polling.
    ///
    /// On failure the controller is back in [`LifecycleState::Stopped`] and
    /// the error is fatal to the caller.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Stopped {
                return Err(BridgeError::InvalidState {
                    expected: LifecycleState::Stopped.as_str(),
                    actual: state.as_str(),
                });
            }
            *state = LifecycleState::Connecting;
        }

        let mut connected = Connected::default();
        if let Err(e) = self.connect_and_subscribe(&mut connected).await {
            error!(error = %e, "failed to start bridge");
            self.release_subscriptions().await;
            self.stop_consumers();
            self.disconnect_partial(connected).await;
            *self.state.lock() = LifecycleState::Stopped;
            return Err(e);
        }

        self.stop_tx.send_replace(false);
        let stop_rx = self.stop_tx.subscribe();
        *self.state.lock() = LifecycleState::Running;
        *self.runner.lock() = Some(tokio::spawn(self.clone().run(stop_rx)));

        info!(
            variables = self.config.variables.len(),
            interval = ?self.timing.current(),
            "bridge running"
        );
        Ok(())
    }

    async fn connect_and_subscribe(&self, connected: &mut Connected) -> Result<()> {
        self.sampler
            .connect()
            .await
            .map_err(|e| as_connectivity("process-data gateway", e))?;
        connected.sampler = true;
        info!("connected to process-data gateway");

        self.publisher
            .connect()
            .await
            .map_err(|e| as_connectivity("message bus", e))?;
        connected.publisher = true;
        info!("connected to message bus");

        let (status_tx, status_rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        {
            let mut consumers = self.consumers.lock();
            consumers.push(tokio::spawn(self.watchdog.clone().run(status_rx)));
            consumers.push(tokio::spawn(Arc::new(self.command_handler()).run(command_rx)));
        }

        for address in self.config.subscription_addresses() {
            let handle = self
                .sampler
                .subscribe(address, status_tx.clone())
                .await
                .map_err(|e| match e {
                    e @ BridgeError::Subscription { .. } => e,
                    other => BridgeError::Subscription {
                        address: address.to_string(),
                        reason: other.to_string(),
                    },
                })?;
            info!(%address, id = handle.id, "subscribed to status changes");
            self.subscriptions.lock().push(handle);
        }

        self.publisher
            .subscribe_commands(COMMAND_TOPIC, command_tx)
            .await
            .map_err(|e| BridgeError::Subscription {
                address: COMMAND_TOPIC.to_string(),
                reason: e.to_string(),
            })?;
        info!(topic = COMMAND_TOPIC, "listening for commands");

        Ok(())
    }

    /// Undo the connections a failed start already made.
    async fn disconnect_partial(&self, connected: Connected) {
        if connected.sampler {
            if let Err(e) = self.sampler.disconnect().await {
                warn!(error = %e, "failed to disconnect from process-data gateway");
            }
        }
        if connected.publisher {
            if let Err(e) = self.publisher.disconnect().await {
                warn!(error = %e, "failed to disconnect from message bus");
            }
        }
    }

    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                break;
            }

            self.cycle().await;

            let interval = self.timing.current();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("poll loop finished");
    }

    /// Run one poll cycle and return the samples that were published.
    ///
    /// A variable whose read fails is left out of the batch; register,
    /// history and publish failures are logged and never abort the cycle.
    pub async fn cycle(&self) -> Vec<Sample> {
        let _guard = self.cycle_guard.lock().await;
        let timestamp = current_timestamp_ms();

        let mut samples = Vec::with_capacity(self.config.variables.len());
        for variable in &self.config.variables {
            let value = match self.sampler.read(&variable.address).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(key = %variable.key, error = %e, "failed to read variable");
                    continue;
                }
            };

            let role = if variable.status {
                Role::Status
            } else {
                Role::Normal
            };
            let mut record = SampleRecord::new(value, role);

            if variable.register.is_enabled() {
                match self
                    .registers
                    .observe_at(&variable.key, &record.value, variable.register, timestamp)
                {
                    Ok(snapshot) => snapshot.apply_to(&mut record),
                    Err(e) => warn!(error = %e, "register not updated"),
                }
            }

            if variable.status {
                self.watchdog.notify(&variable.address, &record.value);
            }

            samples.push(Sample::new(variable.key.clone(), record));
        }

        let position = self.position().await;
        for sample in &mut samples {
            sample.record.enrich(timestamp, position);
        }

        if let Some(history) = &self.history {
            persist(history.clone(), samples.clone()).await;
        }
        self.publish(&samples).await;

        samples
    }

    async fn position(&self) -> Position {
        match self.location.fetch().await {
            Ok(location) => resolve_position(
                &location,
                self.config.fallback,
                self.config.fix_digit_offset,
            ),
            Err(e) => {
                warn!(error = %e, "using fallback position");
                self.config.fallback
            }
        }
    }

    async fn publish(&self, samples: &[Sample]) {
        let mut published = 0;
        for sample in samples {
            let payload = match serde_json::to_vec(&sample.record) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(key = %sample.key, error = %e, "failed to encode record");
                    continue;
                }
            };
            match self.publisher.publish(&sample.key, payload).await {
                Ok(()) => published += 1,
                Err(e) => error!(key = %sample.key, error = %e, "failed to publish record"),
            }
        }
        debug!(published, total = samples.len(), "batch published");
    }

    /// Stop polling, release subscriptions and disconnect.
    ///
    /// Waits for an in-flight cycle to finish. Calling it when the controller
    /// is not running does nothing. Both collaborators are disconnected even
    /// if the first fails; the first failure is returned.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Running {
                debug!(state = state.as_str(), "stop ignored");
                return Ok(());
            }
            *state = LifecycleState::Stopping;
        }
        info!("stopping bridge");

        self.stop_tx.send_replace(true);
        let runner = self.runner.lock().take();
        if let Some(runner) = runner {
            if let Err(e) = runner.await {
                error!(error = %e, "poll loop ended abnormally");
            }
        }

        let _guard = self.cycle_guard.lock().await;
        self.release_subscriptions().await;
        self.stop_consumers();

        let sampler = self.sampler.disconnect().await.map_err(|e| {
            error!(error = %e, "failed to disconnect from process-data gateway");
            as_connectivity("process-data gateway", e)
        });
        if sampler.is_ok() {
            info!("disconnected from process-data gateway");
        }

        let publisher = self.publisher.disconnect().await.map_err(|e| {
            error!(error = %e, "failed to disconnect from message bus");
            as_connectivity("message bus", e)
        });
        if publisher.is_ok() {
            info!("disconnected from message bus");
        }

        *self.state.lock() = LifecycleState::Stopped;
        sampler.and(publisher)
    }

    async fn release_subscriptions(&self) {
        let handles = std::mem::take(&mut *self.subscriptions.lock());
        for handle in handles {
            let address = handle.address.clone();
            if let Err(e) = self.sampler.unsubscribe(handle).await {
                warn!(%address, error = %e, "failed to release subscription");
            }
        }
    }

    fn stop_consumers(&self) {
        for task in self.consumers.lock().drain(..) {
            task.abort();
        }
    }
}

/// Collaborators connected so far during `start`.
#[derive(Debug, Default, Clone, Copy)]
struct Connected {
    sampler: bool,
    publisher: bool,
}

async fn persist(history: Arc<HistoryStore>, samples: Vec<Sample>) {
    let result = on_blocking_pool(move || {
        for sample in &samples {
            if let Err(e) = history.append(&sample.key, &sample.record) {
                error!(key = %sample.key, error = %e, "failed to store record");
            }
        }
        Ok(())
    })
    .await;

    if let Err(e) = result {
        error!(error = %e, "history store unavailable");
    }
}

fn as_connectivity(target: &str, e: BridgeError) -> BridgeError {
    match e {
        e @ BridgeError::Connectivity { .. } => e,
        other => BridgeError::connectivity(target, other),
    }
}
