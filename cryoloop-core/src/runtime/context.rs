//! Runtime context
//!
//! Owns everything the scheduler needs: storage, registry, error log,
//! watchdog and the fault state. It is built once at startup and ticked
//! by the platform's periodic timer; tests build fresh ones freely.
//!
//! ```text
//!   new ─► register_* ─► boot ─► tick ─► tick ─► … ─► Restart(reason)
//!                                  │
//!                                  └─ update every component in order,
//!                                     mirror states to their records,
//!                                     check watchdog and error severity
//! ```

use cryoloop_hal::{FileStorage, StorageError};

use super::events::Event;
use super::fault::{self, FaultStage, PURGE_MARKER};
use super::phase::Phase;
use super::power::PowerLossFlag;
use super::tick::TickContext;
use super::trap::Trap;
use super::watchdog::Watchdog;
use crate::config::RuntimeConfig;
use crate::error::{ErrorCode, ErrorLog, Severity};
use crate::persist::{WriteGate, WriteOutcome};
use crate::registry::component::DynComponent;
use crate::registry::{Component, ComponentId, Registry, RegistryError, StateId, StateInfo};
use crate::state::exposed::DynState;
use crate::state::{AccessError, Applied, ExposedState, StateHandle, ValueType};

/// Why the runtime wants the device reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartReason {
    /// Unrecoverable trap; the stage reached on the medium
    Trap(FaultStage),
    /// Fatal error recorded in the central log
    Fatal,
}

/// Result of one scheduler pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Not booted; nothing ran
    Idle,
    /// All components updated
    Continue,
    /// The platform must reset the device now
    Restart(RestartReason),
}

/// Summary of the boot sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    /// Storage medium mounted
    pub mounted: bool,
    /// A previous boot ended in an unrecoverable fault
    pub prior_fault: bool,
    /// Fault stage found on the medium
    pub stage: Option<FaultStage>,
    /// Bank files discarded as corrupt
    pub corrupt_banks: u16,
    /// Records seeded with their default value
    pub seeded_records: u16,
    /// Stale history wiped on this boot
    pub purged: bool,
}

/// The runtime context
pub struct Runtime<S: FileStorage> {
    pub(crate) storage: S,
    pub(crate) registry: Registry,
    pub(crate) errors: ErrorLog,
    config: RuntimeConfig,
    phase: Phase,
    /// Watchdog used when no trap line is attached
    watchdog: Watchdog,
    trap_line: Option<&'static (dyn Trap + Sync)>,
    power: Option<&'static PowerLossFlag>,
    /// Every record has been initialized; writes may proceed
    init_complete: bool,
    prior_fault: bool,
    /// Markers currently on the medium
    stage: FaultStage,
    /// Consecutive ticks without an error
    healthy_ticks: u32,
    /// Runtime clock (ms), last tick or boot
    pub(crate) now_ms: u64,
    last_cycle_ms: u32,
    ticks: u64,
    /// Writes refused because the supply was failing
    skipped_writes: u32,
    restart: Option<RestartReason>,
    boot_report: BootReport,
}

impl<S: FileStorage> Runtime<S> {
    /// Create a runtime with the given configuration
    ///
    /// Invalid configurations are replaced by the defaults.
    pub fn new(storage: S, config: RuntimeConfig) -> Self {
        Self::with_log(storage, config, ErrorLog::new())
    }

    fn with_log(storage: S, config: RuntimeConfig, mut errors: ErrorLog) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("Config rejected: {:?}, using defaults", e);
                errors.record(ErrorCode::Config, "config rejected", Severity::Warning, 0);
                RuntimeConfig::default()
            }
        };
        Self {
            storage,
            registry: Registry::new(config.max_entries, config.min_write_interval_ms),
            errors,
            watchdog: Watchdog::new(u64::from(config.watchdog_timeout_ms)),
            config,
            phase: Phase::Booting,
            trap_line: None,
            power: None,
            init_complete: false,
            prior_fault: false,
            stage: FaultStage::Clean,
            healthy_ticks: 0,
            now_ms: 0,
            last_cycle_ms: 0,
            ticks: 0,
            skipped_writes: 0,
            restart: None,
            boot_report: BootReport::default(),
        }
    }

    /// Create a runtime configured from `runtime.cfg` on the medium
    ///
    /// Falls back to the defaults if the medium cannot be mounted or holds
    /// no usable configuration.
    pub fn with_stored_config(mut storage: S) -> Self {
        let mut errors = ErrorLog::new();
        let config = match storage.mount() {
            Ok(()) => RuntimeConfig::load(&mut storage, &mut errors),
            Err(_) => RuntimeConfig::default(),
        };
        Self::with_log(storage, config, errors)
    }

    /// Route traps and the watchdog through an out-of-band trap line
    ///
    /// The line's watchdog takes over the configured timeout.
    pub fn with_trap_line(mut self, line: &'static (dyn Trap + Sync)) -> Self {
        line.watchdog()
            .set_timeout(u64::from(self.config.watchdog_timeout_ms));
        self.trap_line = Some(line);
        self
    }

    /// Consult a power-loss flag before every write
    pub fn with_power_flag(mut self, flag: &'static PowerLossFlag) -> Self {
        self.power = Some(flag);
        self
    }

    /// Register a component; its states must follow immediately
    pub fn register_component<C: Component>(
        &mut self,
        component: C,
    ) -> Result<ComponentId, RegistryError> {
        let result = self.registry.register_component(component);
        if let Err(e) = result {
            self.log_registry_error(e);
        }
        result
    }

    /// Register a state of the most recently registered component
    pub fn register_state<C: Component>(
        &mut self,
        state: ExposedState<C>,
    ) -> Result<StateId, RegistryError> {
        let result = self.registry.register_state(state);
        if let Err(e) = result {
            self.log_registry_error(e);
        }
        result
    }

    /// Register a component together with its states
    pub fn add<C, I>(&mut self, component: C, states: I) -> Result<ComponentId, RegistryError>
    where
        C: Component,
        I: IntoIterator<Item = ExposedState<C>>,
    {
        let id = self.register_component(component)?;
        for state in states {
            self.register_state(state)?;
        }
        Ok(id)
    }

    fn log_registry_error(&mut self, error: RegistryError) {
        let (code, message) = match error {
            RegistryError::Sealed => (ErrorCode::RegistrySealed, "registration after boot"),
            RegistryError::Full => (ErrorCode::RegistryFull, "registry full"),
            RegistryError::NoComponent => (ErrorCode::OwnerMismatch, "state without component"),
            RegistryError::OwnerMismatch => (ErrorCode::OwnerMismatch, "state owner type"),
        };
        self.errors.record(code, message, Severity::Error, self.now_ms);
    }

    /// Run the boot sequence
    ///
    /// Seals the registry, mounts storage, wipes stale history on first
    /// boot, reads the fault stage, initializes every record and hydrates
    /// every persisted state. Only the first call has any effect.
    pub fn boot(&mut self, now_ms: u64) -> BootReport {
        if self.phase != Phase::Booting {
            return self.boot_report;
        }
        self.now_ms = now_ms;
        self.registry.seal();
        info!(
            "Booting: {} components, {} states",
            self.registry.component_count(),
            self.registry.state_count()
        );

        let mut report = BootReport::default();
        match self.storage.mount() {
            Ok(()) => report.mounted = true,
            Err(e) => {
                warn!("Storage mount failed: {:?}", e);
                self.errors
                    .record(ErrorCode::MountFailed, "storage mount", Severity::Error, now_ms);
                for record in self.registry.states.iter_mut().filter_map(|s| s.record.as_mut()) {
                    record.set_error(e);
                }
            }
        }

        if report.mounted {
            if !self.storage.exists(PURGE_MARKER) {
                report.purged = self.purge();
            }

            self.stage = FaultStage::read(&mut self.storage);
            self.prior_fault = self.stage.is_fault();
            report.stage = Some(self.stage);
            report.prior_fault = self.prior_fault;
            if self.prior_fault {
                warn!("Prior boot ended in a fault ({:?})", self.stage);
            }

            for entry in self.registry.states.iter_mut() {
                let Some(record) = entry.record.as_mut() else {
                    continue;
                };
                let init = record.init(&mut self.storage);
                if init.corrupt_banks > 0 {
                    report.corrupt_banks += u16::from(init.corrupt_banks);
                    self.errors
                        .record(ErrorCode::CorruptBank, "bank discarded", Severity::Warning, now_ms);
                }
                if init.seeded {
                    report.seeded_records += 1;
                }
            }
            self.init_complete = true;

            for index in 0..self.registry.states.len() {
                // Outcomes are logged by hydrate
                let _ = self.hydrate(index);
            }
        }

        self.apply(Event::BootComplete);
        self.last_cycle_ms = 0;
        self.boot_report = report;
        info!("Boot complete");
        report
    }

    /// Wipe fault markers and all record history, then mark the medium
    fn purge(&mut self) -> bool {
        info!("No purge marker, wiping stale history");
        let mut ok = fault::clear(&mut self.storage).is_ok();
        for entry in self.registry.states.iter_mut() {
            if let Some(record) = entry.record.as_mut() {
                ok &= record.erase(&mut self.storage).is_ok();
            }
        }
        ok &= self.storage.create(PURGE_MARKER).is_ok();
        if !ok {
            self.errors
                .record(ErrorCode::MarkerFailed, "purge", Severity::Error, self.now_ms);
        }
        ok
    }

    /// Run one scheduler pass at `now_ms`
    ///
    /// Updates every component in registration order, mirrors every
    /// persisted state into its record, then checks the watchdog and the
    /// worst error recorded since the previous pass.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        if self.phase.is_terminal() {
            return TickOutcome::Restart(self.restart.unwrap_or(RestartReason::Fatal));
        }
        if !self.phase.is_ticking() {
            return TickOutcome::Idle;
        }
        // Trap taken out of band since the last pass
        if self.trap_line.is_some_and(|line| line.pending().is_some()) {
            return TickOutcome::Restart(self.trap());
        }

        self.last_cycle_ms = u32::try_from(now_ms.saturating_sub(self.now_ms)).unwrap_or(u32::MAX);
        self.now_ms = now_ms;
        self.ticks += 1;

        let watchdog = match self.trap_line {
            Some(line) => line.watchdog(),
            None => &self.watchdog,
        };
        for component in self.registry.components.iter_mut() {
            let mut ctx = TickContext::new(
                now_ms,
                self.last_cycle_ms,
                self.ticks,
                &mut self.errors,
                watchdog,
            );
            component.update(&mut ctx);
            if ctx.halted() {
                warn!("Pass halted by {}", component.name());
                break;
            }
        }

        for index in 0..self.registry.states.len() {
            self.save_state(index);
        }

        if self.watchdog().check(now_ms) {
            self.errors.record(
                ErrorCode::WatchdogExpired,
                "watchdog expired",
                Severity::Halt,
                now_ms,
            );
            return TickOutcome::Restart(self.trap());
        }

        match self.errors.take_worst() {
            Some(Severity::Fatal) => {
                error!("Fatal error, restarting");
                self.apply(Event::FatalError);
                self.restart = Some(RestartReason::Fatal);
                return TickOutcome::Restart(RestartReason::Fatal);
            }
            Some(severity) if severity >= Severity::Error => self.healthy_ticks = 0,
            _ => self.count_healthy_tick(),
        }

        TickOutcome::Continue
    }

    fn count_healthy_tick(&mut self) {
        self.healthy_ticks = self.healthy_ticks.saturating_add(1);
        let threshold = self.config.healthy_ticks_to_clear;
        // A failed clear is retried on the following healthy ticks
        if threshold > 0 && self.healthy_ticks >= threshold && self.stage.is_fault() {
            info!("Healthy for {} ticks, clearing fault markers", self.healthy_ticks);
            let _ = self.clear_markers();
        }
    }

    /// Unrecoverable trap entry point
    ///
    /// Called by the runtime on watchdog expiry, and by the platform on an
    /// illegal hardware condition when it holds the runtime. Escalates the
    /// fault markers, through the trap line if one is attached, and
    /// returns the restart the platform must perform; never allocates.
    ///
    /// Fault handlers that may interrupt a locked runtime call the trap
    /// line instead.
    pub fn trap(&mut self) -> RestartReason {
        if let Some(reason) = self.restart {
            return reason;
        }
        self.apply(Event::Trap);
        let reason = match self.trap_line {
            Some(line) => line.trap(),
            None => RestartReason::Trap(self.escalate()),
        };
        if let RestartReason::Trap(stage) = reason {
            self.stage = stage;
        }
        self.apply(Event::EscalationDone(self.stage));
        self.restart = Some(reason);
        reason
    }

    fn escalate(&mut self) -> FaultStage {
        match fault::escalate(&mut self.storage) {
            Ok(stage) => {
                error!("Unrecoverable trap, fault stage {:?}", stage);
                stage
            }
            Err(_) => {
                self.errors
                    .record(ErrorCode::MarkerFailed, "escalate", Severity::Fatal, self.now_ms);
                self.stage
            }
        }
    }

    fn apply(&mut self, event: Event) {
        let next = self.phase.transition(event);
        if event.is_fault_event() {
            warn!("Fault path: {:?} -> {:?}", self.phase, next);
        } else {
            debug!("Phase {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
    }

    /// Clear the fault markers now (operator acknowledgment)
    pub fn acknowledge_fault(&mut self) -> Result<(), StorageError> {
        self.clear_markers()
    }

    fn clear_markers(&mut self) -> Result<(), StorageError> {
        match fault::clear(&mut self.storage) {
            Ok(()) => {
                self.stage = FaultStage::Clean;
                Ok(())
            }
            Err(e) => {
                self.errors
                    .record(ErrorCode::MarkerFailed, "clear markers", Severity::Error, self.now_ms);
                Err(e)
            }
        }
    }

    /// Arm the watchdog around a bounded operation
    pub fn start_watchdog(&mut self) {
        self.watchdog().start(self.now_ms);
    }

    /// Declare the guarded operation complete
    pub fn stop_watchdog(&mut self) {
        self.watchdog().stop();
    }

    /// Watchdog in use, the trap line's if one is attached
    pub fn watchdog(&self) -> &Watchdog {
        match self.trap_line {
            Some(line) => line.watchdog(),
            None => &self.watchdog,
        }
    }

    /// Write gate at the current runtime clock
    pub(crate) fn write_gate(&self) -> WriteGate {
        WriteGate {
            init_complete: self.init_complete,
            power_failing: self.power.is_some_and(|p| p.is_set()),
            now_ms: self.now_ms,
        }
    }

    /// Mirror a state's current value into its record
    ///
    /// `None` if the state has no record or no current value.
    pub(crate) fn save_state(&mut self, index: usize) -> Option<WriteOutcome> {
        let gate = self.write_gate();
        let entry = self.registry.states.get_mut(index)?;
        let component = self.registry.components.get(entry.owner)?;
        let value = entry.state.read(component.as_any())?;
        let record = entry.record.as_mut()?;

        let had_error = record.error().is_some();
        let outcome = record.write(&mut self.storage, gate, value)?;
        match outcome {
            // Only the first failure is logged; the flag stays set
            WriteOutcome::Failed(_) if !had_error => self.errors.record(
                ErrorCode::WriteFailed,
                entry.state.name(),
                Severity::Error,
                gate.now_ms,
            ),
            WriteOutcome::PowerFailing => {
                self.skipped_writes = self.skipped_writes.saturating_add(1)
            }
            _ => {}
        }
        Some(outcome)
    }

    /// Restore a state from its record
    pub(crate) fn hydrate(&mut self, index: usize) -> Result<Applied, AccessError> {
        let now_ms = self.now_ms;
        let entry = self
            .registry
            .states
            .get_mut(index)
            .ok_or(AccessError::UnknownState)?;
        let record = entry.record.as_mut().ok_or(AccessError::NotSupported)?;
        let component = self
            .registry
            .components
            .get_mut(entry.owner)
            .ok_or(AccessError::OwnerMismatch)?;

        let value = record.read(&mut self.storage);
        if record.error().is_some() {
            self.errors
                .record(ErrorCode::ReadFailed, entry.state.name(), Severity::Error, now_ms);
        }

        let result = entry.state.restore(component.as_any_mut(), value);
        let name = entry.state.name();
        match result {
            Ok(Applied::Exact) => {}
            Ok(Applied::Clamped) => {
                self.errors
                    .record(ErrorCode::RangeClamped, name, Severity::Warning, now_ms)
            }
            Err(AccessError::InvalidValue) if entry.state.value_type() == ValueType::Index => {
                self.errors
                    .record(ErrorCode::SelectionIndexInvalid, name, Severity::Error, now_ms)
            }
            Err(_) => self
                .errors
                .record(ErrorCode::InvalidValue, name, Severity::Error, now_ms),
        }
        result
    }

    /// Access a state by durable identifier
    pub fn state(&mut self, id: StateId) -> Option<StateHandle<'_, S>> {
        let index = self.registry.position(id)?;
        Some(StateHandle::new(self, index))
    }

    /// Access the first state with a given name
    pub fn state_by_name(&mut self, name: &str) -> Option<StateHandle<'_, S>> {
        let index = self.registry.position_by_name(name)?;
        Some(StateHandle::new(self, index))
    }

    /// States in registration order
    pub fn states(&self) -> impl Iterator<Item = StateInfo> + '_ {
        self.registry.states()
    }

    /// Components in registration order
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &'static str)> + '_ {
        self.registry.components()
    }

    /// Central error log
    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Central error log, for clearing after inspection
    pub fn errors_mut(&mut self) -> &mut ErrorLog {
        &mut self.errors
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// A previous boot ended in an unrecoverable fault
    ///
    /// Fixed at boot; clearing the markers does not change it.
    pub fn prior_fault(&self) -> bool {
        self.prior_fault
    }

    /// Fault stage currently recorded on the medium
    pub fn fault_stage(&self) -> FaultStage {
        self.stage
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Report from the boot sequence
    pub fn boot_report(&self) -> BootReport {
        self.boot_report
    }

    /// Runtime clock of the last tick (ms)
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Duration of the last tick cycle (ms)
    pub fn last_cycle_ms(&self) -> u32 {
        self.last_cycle_ms
    }

    /// Ticks since boot
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Writes refused because the supply was failing
    pub fn skipped_writes(&self) -> u32 {
        self.skipped_writes
    }

    /// Storage medium
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tear down, keeping the medium (a simulated power cycle)
    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE;
    use crate::runtime::{Halted, TrapLine};
    use crate::state::Selection;
    use alloc::boxed::Box;
    use alloc::vec::Vec;
    use cryoloop_hal::RamStorage;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use std::sync::{Arc, Mutex};

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            min_write_interval_ms: 0,
            healthy_ticks_to_clear: 5,
            ..Default::default()
        }
    }

    /// Simulated power cycle: keep the medium, lose the mount
    fn power_cycle(runtime: Runtime<RamStorage>) -> RamStorage {
        let mut storage = runtime.into_storage();
        storage.unmount();
        storage
    }

    struct Tracer {
        index: usize,
        count: i32,
        trace: Arc<Mutex<Vec<usize>>>,
    }

    impl Component for Tracer {
        fn name(&self) -> &'static str {
            "tracer"
        }

        fn update(&mut self, _ctx: &mut TickContext<'_>) {
            self.count += 1;
            if let Ok(mut trace) = self.trace.lock() {
                trace.push(self.index);
            }
        }
    }

    struct Guard {
        stop_at: u64,
    }

    impl Component for Guard {
        fn name(&self) -> &'static str {
            "guard"
        }

        fn update(&mut self, ctx: &mut TickContext<'_>) {
            if ctx.tick() == 1 {
                ctx.start_watchdog();
            }
            if ctx.now_ms() >= self.stop_at && ctx.watchdog_running() {
                ctx.stop_watchdog();
            }
        }
    }

    struct Interlock {
        open_at: u64,
    }

    impl Component for Interlock {
        fn name(&self) -> &'static str {
            "interlock"
        }

        fn update(&mut self, ctx: &mut TickContext<'_>) {
            if ctx.tick() == self.open_at {
                assert_eq!(ctx.report("interlock open", Severity::Halt), Err(Halted));
            } else {
                assert_eq!(ctx.report("interlock closed", Severity::Info), Ok(()));
            }
        }
    }

    struct Pump {
        target: f64,
        mode: i32,
        fail_at: Option<u64>,
    }

    impl Component for Pump {
        fn name(&self) -> &'static str {
            "pump"
        }

        fn update(&mut self, ctx: &mut TickContext<'_>) {
            if self.fail_at == Some(ctx.tick()) {
                let _ = ctx.report("pump seized", Severity::Fatal);
            }
        }
    }

    fn pump_runtime(storage: RamStorage, pump: Pump) -> Runtime<RamStorage> {
        let mut runtime = Runtime::new(storage, config());
        runtime
            .add(
                pump,
                [
                    ExposedState::read_write("Target", |p: &Pump| p.target, |p, v| p.target = v),
                    ExposedState::selection(
                        "Mode",
                        |p: &Pump| p.mode,
                        |p, v| p.mode = v,
                        Selection::new(&[(1, "A"), (2, "B"), (3, "C")]).unwrap(),
                    ),
                ],
            )
            .unwrap();
        runtime
    }

    fn pump() -> Pump {
        Pump {
            target: 1.5,
            mode: 2,
            fail_at: None,
        }
    }

    #[test]
    fn test_updates_in_registration_order() {
        const COMPONENTS: usize = 4;
        const TICKS: u64 = 7;

        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = Runtime::new(RamStorage::new(), config());
        for index in 0..COMPONENTS {
            runtime
                .add(
                    Tracer {
                        index,
                        count: 0,
                        trace: trace.clone(),
                    },
                    [ExposedState::read_only(
                        "Count",
                        |p: &Tracer| p.count,
                        |p, v| p.count = v,
                    )],
                )
                .unwrap();
        }
        runtime.boot(0);

        for tick in 1..=TICKS {
            assert_eq!(runtime.tick(tick * 100), TickOutcome::Continue);
        }

        // Component i has ordinal 2i, its state 2i + 1
        for index in 0..COMPONENTS {
            let id = StateId(2 * index as u16 + 1);
            let count = runtime.state(id).unwrap().get::<i32>();
            assert_eq!(count, Some(TICKS as i32));
        }
        let expected: Vec<usize> = (0..TICKS).flat_map(|_| 0..COMPONENTS).collect();
        assert_eq!(*trace.lock().unwrap(), expected);
        assert_eq!(runtime.last_cycle_ms(), 100);
    }

    #[test]
    fn test_tick_before_boot_is_idle() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        assert_eq!(runtime.tick(100), TickOutcome::Idle);
        assert_eq!(runtime.phase(), Phase::Booting);
    }

    #[test]
    fn test_watchdog_expiry_traps_once() {
        let mut runtime = Runtime::new(RamStorage::new(), config());
        runtime.register_component(Guard { stop_at: u64::MAX }).unwrap();
        runtime.boot(0);

        // Armed on the first tick at 100 ms
        for now in (100..5100).step_by(100) {
            assert_eq!(runtime.tick(now), TickOutcome::Continue);
        }
        let outcome = runtime.tick(5100);
        assert_eq!(outcome, TickOutcome::Restart(RestartReason::Trap(FaultStage::Stage1)));
        assert_eq!(runtime.tick(5200), outcome);

        assert_eq!(runtime.phase(), Phase::Restarting);
        assert_eq!(runtime.errors().count(ErrorCode::WatchdogExpired), 1);
        let mut storage = power_cycle(runtime);
        storage.mount().unwrap();
        assert_eq!(FaultStage::read(&mut storage), FaultStage::Stage1);
    }

    #[test]
    fn test_watchdog_stopped_in_time() {
        let mut runtime = Runtime::new(RamStorage::new(), config());
        runtime.register_component(Guard { stop_at: 4100 }).unwrap();
        runtime.boot(0);

        for now in (100..=10_000).step_by(100) {
            assert_eq!(runtime.tick(now), TickOutcome::Continue);
        }
        assert!(!runtime.watchdog().is_running());
        assert_eq!(runtime.errors().count(ErrorCode::WatchdogExpired), 0);
    }

    #[test]
    fn test_three_traps_reach_stage3() {
        let mut storage = RamStorage::new();
        for expected in [FaultStage::Stage1, FaultStage::Stage2, FaultStage::Stage3] {
            let mut runtime = pump_runtime(storage, pump());
            runtime.boot(0);
            assert_eq!(runtime.trap(), RestartReason::Trap(expected));
            storage = power_cycle(runtime);
        }

        let mut runtime = pump_runtime(storage, pump());
        let report = runtime.boot(0);
        assert!(report.prior_fault);
        assert_eq!(report.stage, Some(FaultStage::Stage3));
        assert!(runtime.prior_fault());
    }

    #[test]
    fn test_healthy_period_clears_markers() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        runtime.trap();

        let mut runtime = pump_runtime(power_cycle(runtime), pump());
        assert!(runtime.boot(0).prior_fault);
        for tick in 1..5 {
            runtime.tick(tick * 100);
        }
        assert_eq!(runtime.fault_stage(), FaultStage::Stage1);
        runtime.tick(500);
        assert_eq!(runtime.fault_stage(), FaultStage::Clean);
        // Fixed for the rest of the session
        assert!(runtime.prior_fault());

        let mut runtime = pump_runtime(power_cycle(runtime), pump());
        assert!(!runtime.boot(0).prior_fault);
    }

    #[test]
    fn test_errors_reset_healthy_count() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        runtime.trap();

        let mut runtime = pump_runtime(power_cycle(runtime), pump());
        runtime.boot(0);
        for tick in 1..=4 {
            runtime.tick(tick * 100);
        }
        runtime
            .errors_mut()
            .record(ErrorCode::ReadFailed, "test", Severity::Error, 450);
        // The tick at 500 ms sees the error and restarts the count
        for tick in 5..=9 {
            runtime.tick(tick * 100);
        }
        assert_eq!(runtime.fault_stage(), FaultStage::Stage1);
        runtime.tick(1000);
        assert_eq!(runtime.fault_stage(), FaultStage::Clean);
    }

    #[test]
    fn test_acknowledge_fault() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        runtime.trap();

        let mut runtime = pump_runtime(power_cycle(runtime), pump());
        runtime.boot(0);
        runtime.acknowledge_fault().unwrap();
        assert_eq!(runtime.fault_stage(), FaultStage::Clean);
        assert_eq!(runtime.storage().contents("fault1"), None);
    }

    #[test]
    fn test_fatal_error_requests_restart() {
        let mut runtime = pump_runtime(
            RamStorage::new(),
            Pump {
                fail_at: Some(3),
                ..pump()
            },
        );
        runtime.boot(0);
        assert_eq!(runtime.tick(100), TickOutcome::Continue);
        assert_eq!(runtime.tick(200), TickOutcome::Continue);
        assert_eq!(runtime.tick(300), TickOutcome::Restart(RestartReason::Fatal));
        assert_eq!(runtime.phase(), Phase::Restarting);
        // No fault marker for a controlled restart
        assert_eq!(runtime.storage().contents("fault1"), None);
    }

    #[test]
    fn test_selection_persists_index() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        // Mode is the third registration
        assert_eq!(runtime.storage().contents("2"), Some(&[1u8, 0][..]));

        let mut storage = RamStorage::new();
        storage.insert_raw(PURGE_MARKER, &[]);
        storage.insert_raw("2", &[1, 0, 2, 0]);
        let mut runtime = pump_runtime(storage, pump());
        runtime.boot(0);
        let mode = runtime.state_by_name("Mode").unwrap();
        assert_eq!(mode.display().as_str(), "C");
        assert_eq!(mode.value(), Some(crate::state::Value::Index(2)));
    }

    #[test]
    fn test_invalid_selection_index_keeps_default() {
        let mut storage = RamStorage::new();
        storage.insert_raw(PURGE_MARKER, &[]);
        storage.insert_raw("2", &[9, 0]);
        let mut runtime = pump_runtime(storage, pump());
        runtime.boot(0);

        let mode = runtime.state_by_name("Mode").unwrap();
        assert_eq!(mode.display().as_str(), "B");
        assert_eq!(runtime.errors().count(ErrorCode::SelectionIndexInvalid), 1);
    }

    #[test]
    fn test_value_survives_power_cycle() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        runtime.state_by_name("Target").unwrap().set(-3.25).unwrap();

        let mut runtime = pump_runtime(power_cycle(runtime), pump());
        let report = runtime.boot(0);
        assert!(!report.purged);
        assert_eq!(report.seeded_records, 0);
        let target = runtime.state_by_name("Target").unwrap().get::<f64>();
        assert_eq!(target, Some(-3.25));
    }

    #[test]
    fn test_first_boot_purges_stale_history() {
        let mut storage = RamStorage::new();
        storage.insert_raw("1", &7.0f64.to_le_bytes());
        storage.insert_raw("fault1", &[]);
        let mut runtime = pump_runtime(storage, pump());
        let report = runtime.boot(0);

        assert!(report.purged);
        assert!(!report.prior_fault);
        assert_eq!(report.seeded_records, 2);
        assert_eq!(runtime.state_by_name("Target").unwrap().get::<f64>(), Some(1.5));
        assert!(runtime.storage().contents(PURGE_MARKER).is_some());
    }

    #[test]
    fn test_corrupt_bank_discarded() {
        let mut storage = RamStorage::new();
        storage.insert_raw(PURGE_MARKER, &[]);
        storage.insert_raw("1", &[0, 1, 2]);
        let mut runtime = pump_runtime(storage, pump());
        let report = runtime.boot(0);

        assert_eq!(report.corrupt_banks, 1);
        assert_eq!(runtime.errors().count(ErrorCode::CorruptBank), 1);
        assert_eq!(runtime.storage().contents("1").map(|c| c.len()), Some(8));
    }

    #[test]
    fn test_mount_failure_keeps_running() {
        let mut storage = RamStorage::new();
        storage.fail_mount = true;
        let mut runtime = pump_runtime(storage, pump());
        let report = runtime.boot(0);

        assert!(!report.mounted);
        assert_eq!(runtime.errors().count(ErrorCode::MountFailed), 1);
        let mut target = runtime.state_by_name("Target").unwrap();
        assert_eq!(target.record_error(), Some(StorageError::NotMounted));
        assert_eq!(target.set(2.0), Ok(Applied::Exact));
        assert_eq!(target.save(), Some(WriteOutcome::NotReady));
        assert_eq!(runtime.tick(100), TickOutcome::Continue);
        assert_eq!(runtime.storage().file_count(), 0);
    }

    #[test]
    fn test_registration_after_boot_rejected() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        assert_eq!(runtime.register_component(pump()), Err(RegistryError::Sealed));
        assert_eq!(runtime.errors().count(ErrorCode::RegistrySealed), 1);
        assert_eq!(runtime.components().count(), 1);
    }

    #[test]
    fn test_power_loss_blocks_writes() {
        let flag: &'static PowerLossFlag = Box::leak(Box::new(PowerLossFlag::new()));
        let mut runtime = pump_runtime(RamStorage::new(), pump()).with_power_flag(flag);
        runtime.boot(0);

        flag.signal();
        let mut target = runtime.state_by_name("Target").unwrap();
        target.set(9.0).unwrap();
        assert_eq!(target.history_len(), 1);
        assert_eq!(runtime.skipped_writes(), 1);

        flag.clear();
        runtime.tick(100);
        assert_eq!(runtime.state_by_name("Target").unwrap().history_len(), 2);
    }

    #[test]
    fn test_stored_config_applied() {
        let mut storage = RamStorage::new();
        storage.mount().unwrap();
        RuntimeConfig {
            watchdog_timeout_ms: 2000,
            ..Default::default()
        }
        .store(&mut storage)
        .unwrap();
        storage.unmount();

        let runtime = Runtime::with_stored_config(storage);
        assert_eq!(runtime.config().watchdog_timeout_ms, 2000);
        assert_eq!(runtime.watchdog().timeout_ms(), 2000);
    }

    #[test]
    fn test_introspection() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);

        let infos: Vec<StateInfo> = runtime.states().collect();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].id, StateId(1));
        assert_eq!(infos[1].name, "Mode");
        assert_eq!(infos[1].value_type, ValueType::Index);
        assert_eq!(infos[1].owner, ComponentId(0));
        assert!(runtime.state(StateId(0)).is_none());
    }
    #[test]
    fn test_failed_marker_clear_is_retried() {
        let mut runtime = pump_runtime(RamStorage::new(), pump());
        runtime.boot(0);
        runtime.trap();

        let mut runtime = pump_runtime(power_cycle(runtime), pump());
        runtime.boot(0);
        runtime.storage.fail_writes = true;
        for tick in 1..=5 {
            runtime.tick(tick * 100);
        }
        assert_eq!(runtime.errors().count(ErrorCode::MarkerFailed), 1);
        assert_eq!(runtime.fault_stage(), FaultStage::Stage1);

        runtime.storage.fail_writes = false;
        // The failure restarts the healthy count at 600 ms
        for tick in 6..=10 {
            runtime.tick(tick * 100);
        }
        assert_eq!(runtime.fault_stage(), FaultStage::Stage1);
        runtime.tick(1100);
        assert_eq!(runtime.fault_stage(), FaultStage::Clean);
        assert_eq!(runtime.storage().contents("fault1"), None);
    }

    #[test]
    fn test_halt_stops_the_pass() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = Runtime::new(RamStorage::new(), config());
        runtime.register_component(Interlock { open_at: 2 }).unwrap();
        runtime
            .add(
                Tracer {
                    index: 1,
                    count: 0,
                    trace: trace.clone(),
                },
                [ExposedState::read_only(
                    "Count",
                    |p: &Tracer| p.count,
                    |p, v| p.count = v,
                )],
            )
            .unwrap();
        runtime.boot(0);

        for tick in 1..=3 {
            assert_eq!(runtime.tick(tick * 100), TickOutcome::Continue);
        }
        assert_eq!(runtime.state_by_name("Count").unwrap().get::<i32>(), Some(2));
        assert_eq!(*trace.lock().unwrap(), [1, 1]);
        assert_eq!(runtime.phase(), Phase::Running);
    }

    #[test]
    fn test_rejected_config_recorded() {
        let runtime = Runtime::new(
            RamStorage::new(),
            RuntimeConfig {
                tick_period_ms: 0,
                ..Default::default()
            },
        );
        assert_eq!(runtime.config(), &RuntimeConfig::default());
        assert_eq!(runtime.errors().count(ErrorCode::Config), 1);
    }

    #[test]
    fn test_unusable_stored_config_recorded() {
        let mut storage = RamStorage::new();
        storage.insert_raw(CONFIG_FILE, &[0xFF; 5]);
        let runtime = Runtime::with_stored_config(storage);
        assert_eq!(runtime.config(), &RuntimeConfig::default());
        assert_eq!(runtime.errors().count(ErrorCode::Config), 1);

        let runtime = Runtime::with_stored_config(RamStorage::new());
        assert_eq!(runtime.errors().count(ErrorCode::Config), 0);
    }

    #[test]
    fn test_trap_goes_through_trap_line() {
        let mut medium = RamStorage::new();
        medium.insert_raw("fault1", &[]);
        let line: &'static TrapLine<CriticalSectionRawMutex, RamStorage> =
            Box::leak(Box::new(TrapLine::new(medium, 60_000)));

        let mut runtime = pump_runtime(RamStorage::new(), pump()).with_trap_line(line);
        assert_eq!(runtime.watchdog().timeout_ms(), 5000);
        runtime.boot(0);
        runtime.start_watchdog();
        assert_eq!(runtime.tick(4900), TickOutcome::Continue);

        let expected = RestartReason::Trap(FaultStage::Stage2);
        assert_eq!(runtime.tick(5000), TickOutcome::Restart(expected));
        assert_eq!(line.pending(), Some(expected));
        assert_eq!(runtime.fault_stage(), FaultStage::Stage2);
        // Markers go to the line's medium only
        assert_eq!(runtime.storage().contents("fault1"), None);
    }
}
