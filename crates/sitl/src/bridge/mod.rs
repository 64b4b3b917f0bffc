pub mod time;

pub use time::TimeMode;

use balbot_core::command::{self, Command, CommandQueue};
use balbot_core::parameters::{BalanceParams, BatteryParams};
use balbot_core::telemetry::TelemetrySnapshot;
use balbot_core::traits::TimeSource;
use balbot_core::{BalanceConfig, BalanceLoop, DriveCommand, MotionState};

use crate::adapter::SimulatorAdapter;
use crate::error::SimulatorError;
use crate::platform::{SimClock, SimHardware};
use crate::store::MemoryStore;

/// SITL Bridge orchestrator.
///
/// Couples one plant adapter with one balance loop: each step moves the
/// plant's sensor data into the simulated peripherals, runs one controller
/// tick, and sends the resulting wheel torques back to the plant.
pub struct SitlBridge<A: SimulatorAdapter> {
    adapter: A,
    hardware: SimHardware,
    store: MemoryStore,
    time: SimClock,
    core: BalanceLoop,
    queue: CommandQueue,
    time_mode: TimeMode,
    last_command: DriveCommand,
    started: bool,
}

impl<A: SimulatorAdapter> SitlBridge<A> {
    pub fn new(adapter: A, store: MemoryStore) -> Self {
        Self::with_config(adapter, store, BalanceConfig::default())
    }

    pub fn with_config(adapter: A, store: MemoryStore, config: BalanceConfig) -> Self {
        Self {
            adapter,
            hardware: SimHardware::new(),
            store,
            time: SimClock::new(),
            core: BalanceLoop::new(config),
            queue: CommandQueue::new(),
            time_mode: TimeMode::default(),
            last_command: DriveCommand::ZERO,
            started: false,
        }
    }

    /// Connect the plant and boot the controller from the store.
    pub async fn start(&mut self) -> Result<(), SimulatorError> {
        self.adapter.connect().await?;
        if self.adapter.step_size_us() == 0 {
            return Err(SimulatorError::InvalidConfig(
                "step size must be non-zero".to_string(),
            ));
        }
        if !self.adapter.capabilities().has_all_sensors() {
            return Err(SimulatorError::InvalidConfig(format!(
                "adapter '{}' does not simulate every sensor",
                self.adapter.name()
            )));
        }

        let params = self.store.params();
        let balance = BalanceParams::from_store(params);
        if balance.is_configured() {
            self.core.apply_params(&balance);
        } else {
            log::warn!("Balance parameters incomplete, keeping built-in gains");
        }
        let battery = BatteryParams::from_store(params);
        if battery.is_configured() {
            self.core.set_battery_thresholds(battery.thresholds());
        }

        self.core.init(&self.store);
        self.time.reset_to(self.adapter.sim_time_us());
        self.started = true;
        log::info!(
            "SITL started with adapter '{}' ({}), step {} us",
            self.adapter.name(),
            self.adapter.adapter_type(),
            self.adapter.step_size_us()
        );
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), SimulatorError> {
        self.started = false;
        self.adapter.disconnect().await
    }

    /// Queue a command for the next tick.
    pub fn submit(&mut self, cmd: Command) -> Result<(), SimulatorError> {
        command::submit(&mut self.queue, cmd)?;
        Ok(())
    }

    /// Advance plant and controller by one step.
    pub async fn step(&mut self) -> Result<TelemetrySnapshot, SimulatorError> {
        if !self.started {
            return Err(SimulatorError::NotConnected(self.adapter.name().to_string()));
        }

        let data = self
            .adapter
            .receive_sensors()
            .await?
            .ok_or(SimulatorError::NoSensorData)?;
        self.hardware.inject_sensors(&data);
        self.time.sync_to(data.timestamp_us);

        let queue = &mut self.queue;
        self.last_command = self.core.run_tick(
            &mut self.hardware,
            &mut self.store,
            &self.time,
            std::iter::from_fn(|| queue.dequeue()),
        );

        if let Err(e) = self.store.flush() {
            log::warn!("Parameter file write failed: {}", e);
        }

        let actuators = self.hardware.collect_actuator_commands(data.timestamp_us);
        self.adapter.send_actuators(&actuators).await?;
        self.adapter.step().await?;

        if let Some(pace) = self.time_mode.pace(self.adapter.step_size_us()) {
            tokio::time::sleep(pace).await;
        }

        Ok(self.core.telemetry())
    }

    /// Run for `duration_ms` of simulated time.
    pub async fn run_for(&mut self, duration_ms: u64) -> Result<TelemetrySnapshot, SimulatorError> {
        let end_ms = self.time.now_ms() + duration_ms;
        let mut snapshot = self.core.telemetry();
        while self.time.now_ms() < end_ms {
            snapshot = self.step().await?;
        }
        Ok(snapshot)
    }

    /// Step until `pred` holds or `max_ms` of simulated time passes.
    /// Returns the snapshot that satisfied `pred`, or `None` on timeout.
    pub async fn run_until<F>(
        &mut self,
        mut pred: F,
        max_ms: u64,
    ) -> Result<Option<TelemetrySnapshot>, SimulatorError>
    where
        F: FnMut(&TelemetrySnapshot) -> bool,
    {
        let end_ms = self.time.now_ms() + max_ms;
        while self.time.now_ms() < end_ms {
            let snapshot = self.step().await?;
            if pred(&snapshot) {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }

    /// Step until the controller reaches `state`.
    pub async fn wait_for_state(
        &mut self,
        state: MotionState,
        max_ms: u64,
    ) -> Result<Option<TelemetrySnapshot>, SimulatorError> {
        self.run_until(|s| s.state == state, max_ms).await
    }

    /// Persist the controller's current gains and pitch zero.
    pub fn save_params(&mut self) -> Result<(), SimulatorError> {
        BalanceParams::capture(self.core.robot()).save(self.store.params_mut())?;
        self.store.flush()?;
        Ok(())
    }

    pub fn set_time_mode(&mut self, mode: TimeMode) {
        self.time_mode = mode;
    }

    pub fn time_mode(&self) -> TimeMode {
        self.time_mode
    }

    pub fn sim_time_us(&self) -> u64 {
        self.time.now_us()
    }

    pub fn last_command(&self) -> DriveCommand {
        self.last_command
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn hardware_mut(&mut self) -> &mut SimHardware {
        &mut self.hardware
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    pub fn core(&self) -> &BalanceLoop {
        &self.core
    }
}
