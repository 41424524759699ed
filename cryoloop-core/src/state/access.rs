//! Generic state access
//!
//! [`StateHandle`] is the only surface the presentation and transport
//! layers use: kind and type introspection, typed get/set, display
//! rendering, option labels, action invocation and persistence. Misuse is
//! logged to the central error log and turned into a no-op.

use cryoloop_hal::{FileStorage, StorageError};

use super::exposed::{AccessError, Applied, DynState, RangeInfo, StateKind};
use super::selection::OptionLabels;
use super::value::{DisplayString, StateValue, Value, ValueType};
use crate::error::{ErrorCode, Severity};
use crate::persist::WriteOutcome;
use crate::registry::component::DynComponent;
use crate::registry::table::StateEntry;
use crate::registry::{StateId, StateInfo};
use crate::runtime::Runtime;

/// Borrowed access to one registered state
pub struct StateHandle<'a, S: FileStorage> {
    runtime: &'a mut Runtime<S>,
    index: usize,
}

impl<'a, S: FileStorage> StateHandle<'a, S> {
    pub(crate) fn new(runtime: &'a mut Runtime<S>, index: usize) -> Self {
        Self { runtime, index }
    }

    fn entry(&self) -> &StateEntry {
        &self.runtime.registry.states[self.index]
    }

    fn log(&mut self, code: ErrorCode, severity: Severity) {
        let name = self.name();
        let now_ms = self.runtime.now_ms;
        self.runtime.errors.record(code, name, severity, now_ms);
    }

    /// Durable identifier
    pub fn id(&self) -> StateId {
        self.entry().id
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        self.entry().state.name()
    }

    /// Kind of state
    pub fn kind(&self) -> StateKind {
        self.entry().state.kind()
    }

    /// Value type tag
    pub fn value_type(&self) -> ValueType {
        self.entry().state.value_type()
    }

    /// Introspection record
    pub fn info(&self) -> StateInfo {
        self.entry().info()
    }

    /// Name of the owning component
    pub fn owner_name(&self) -> &'static str {
        let owner = self.entry().owner;
        self.runtime.registry.components[owner].name()
    }

    /// Current value as a tagged value
    ///
    /// Selections report their option index. `None` for actions.
    pub fn value(&self) -> Option<Value> {
        let entry = self.entry();
        let owner = &self.runtime.registry.components[entry.owner];
        entry.state.read(owner.as_any())
    }

    /// Current value as `T`
    ///
    /// Returns `None`, and logs a type mismatch, if `T` is not the state's
    /// value type.
    pub fn get<T: StateValue>(&mut self) -> Option<T> {
        if T::TYPE != self.value_type() {
            self.log(ErrorCode::TypeMismatch, Severity::Warning);
            return None;
        }
        self.value().and_then(T::from_value)
    }

    /// Set the value from `T`
    ///
    /// A `T` other than the state's value type leaves the state untouched.
    pub fn set<T: StateValue>(&mut self, value: T) -> Result<Applied, AccessError> {
        if T::TYPE != self.value_type() {
            self.log(ErrorCode::TypeMismatch, Severity::Warning);
            return Err(AccessError::TypeMismatch);
        }
        self.set_value(value.into_value())
    }

    /// Set the value from a tagged value, then save it
    ///
    /// Ranged states clamp into their bounds; the clamp is logged.
    pub fn set_value(&mut self, value: Value) -> Result<Applied, AccessError> {
        let result = {
            let runtime = &mut *self.runtime;
            let entry = &runtime.registry.states[self.index];
            let owner = &mut runtime.registry.components[entry.owner];
            entry.state.write(owner.as_any_mut(), value)
        };
        match result {
            Ok(applied) => {
                if applied == Applied::Clamped {
                    self.log(ErrorCode::RangeClamped, Severity::Warning);
                }
                self.save();
            }
            Err(AccessError::TypeMismatch) => self.log(ErrorCode::TypeMismatch, Severity::Warning),
            Err(AccessError::InvalidValue) => self.log(ErrorCode::InvalidValue, Severity::Warning),
            Err(_) => self.log(ErrorCode::NotSupported, Severity::Warning),
        }
        result
    }

    /// Value rendered for display
    ///
    /// Selections render the label of the current option.
    pub fn display(&self) -> DisplayString {
        let entry = self.entry();
        match self.value() {
            Some(Value::Index(i)) => {
                let mut out = DisplayString::new();
                let label = entry.state.option_label(i).unwrap_or("?");
                // Labels longer than the display buffer are cut off
                for c in label.chars() {
                    if out.push(c).is_err() {
                        break;
                    }
                }
                out
            }
            Some(value) => value.render(),
            None if entry.state.kind() == StateKind::SelectionReadWrite => {
                let mut out = DisplayString::new();
                let _ = out.push('?');
                out
            }
            None => DisplayString::new(),
        }
    }

    /// Labels of a selection's options, in index order
    pub fn option_labels(&self) -> Option<OptionLabels> {
        self.entry().state.option_labels()
    }

    /// Bounds of a ranged state
    pub fn range(&self) -> Option<RangeInfo> {
        self.entry().state.range()
    }

    /// Run an action
    pub fn invoke(&mut self) -> Result<(), AccessError> {
        let result = {
            let runtime = &mut *self.runtime;
            let entry = &runtime.registry.states[self.index];
            let owner = &mut runtime.registry.components[entry.owner];
            entry.state.invoke(owner.as_any_mut())
        };
        if result.is_err() {
            self.log(ErrorCode::NotSupported, Severity::Warning);
        }
        result
    }

    /// Write the current value to the record, subject to debounce
    ///
    /// `None` for states without a record.
    pub fn save(&mut self) -> Option<WriteOutcome> {
        self.runtime.save_state(self.index)
    }

    /// Restore the value from the record
    pub fn load(&mut self) -> Result<Applied, AccessError> {
        self.runtime.hydrate(self.index)
    }

    /// Last storage error of the record
    pub fn record_error(&self) -> Option<StorageError> {
        self.entry().record.as_ref().and_then(|r| r.error())
    }

    /// Clear the record's error flag
    pub fn clear_record_error(&mut self) {
        if let Some(record) = self.runtime.registry.states[self.index].record.as_mut() {
            record.clear_error();
        }
    }

    /// Records of history held for this state
    pub fn history_len(&self) -> usize {
        self.entry().record.as_ref().map_or(0, |r| r.entries())
    }

    /// Historic value, oldest first
    pub fn history(&mut self, index: usize) -> Option<Value> {
        let runtime = &mut *self.runtime;
        let record = runtime.registry.states[self.index].record.as_mut()?;
        record.get_element(&mut runtime.storage, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::registry::Component;
    use crate::runtime::TickContext;
    use crate::state::{ExposedState, Selection};
    use cryoloop_hal::RamStorage;

    struct Chiller {
        temperature: f64,
        setpoint: i32,
        mode: i32,
        enabled: bool,
        resets: u32,
    }

    impl Component for Chiller {
        fn name(&self) -> &'static str {
            "chiller"
        }

        fn update(&mut self, _ctx: &mut TickContext<'_>) {}
    }

    fn runtime() -> Runtime<RamStorage> {
        let config = RuntimeConfig {
            min_write_interval_ms: 0,
            ..Default::default()
        };
        let mut runtime = Runtime::new(RamStorage::new(), config);
        runtime
            .add(
                Chiller {
                    temperature: 4.0,
                    setpoint: 5,
                    mode: 20,
                    enabled: false,
                    resets: 0,
                },
                [
                    ExposedState::read_only(
                        "Temp",
                        |c: &Chiller| c.temperature,
                        |c, v| c.temperature = v,
                    ),
                    ExposedState::ranged(
                        "Setpoint",
                        |c: &Chiller| c.setpoint,
                        |c, v| c.setpoint = v,
                        0,
                        10,
                        1,
                    ),
                    ExposedState::selection(
                        "Mode",
                        |c: &Chiller| c.mode,
                        |c, v| c.mode = v,
                        Selection::new(&[(10, "Slow"), (20, "Normal"), (30, "Fast")]).unwrap(),
                    ),
                    ExposedState::read_write(
                        "Enabled",
                        |c: &Chiller| c.enabled,
                        |c, v| c.enabled = v,
                    ),
                    ExposedState::action("Reset", |c: &mut Chiller| c.resets += 1),
                ],
            )
            .unwrap();
        runtime.boot(0);
        runtime
    }

    #[test]
    fn test_type_guard_is_noop() {
        let mut runtime = runtime();
        let mut temp = runtime.state_by_name("Temp").unwrap();
        assert_eq!(temp.set(7i32), Err(AccessError::TypeMismatch));
        assert_eq!(temp.get::<bool>(), None);
        assert_eq!(temp.get::<f64>(), Some(4.0));
        assert_eq!(runtime.errors().count(ErrorCode::TypeMismatch), 2);
    }

    #[test]
    fn test_read_only_refuses_set() {
        let mut runtime = runtime();
        let mut temp = runtime.state_by_name("Temp").unwrap();
        assert_eq!(temp.set(9.0f64), Err(AccessError::ReadOnly));
        assert_eq!(temp.get::<f64>(), Some(4.0));
    }

    #[test]
    fn test_range_clamped_and_logged() {
        let mut runtime = runtime();
        let mut setpoint = runtime.state_by_name("Setpoint").unwrap();
        assert_eq!(setpoint.set(15), Ok(Applied::Clamped));
        assert_eq!(setpoint.get::<i32>(), Some(10));
        assert_eq!(
            setpoint.range().map(|r| r.max),
            Some(Value::Int(10))
        );
        assert_eq!(runtime.errors().count(ErrorCode::RangeClamped), 1);
    }

    #[test]
    fn test_selection_display_and_index() {
        let mut runtime = runtime();
        let mut mode = runtime.state_by_name("Mode").unwrap();
        assert_eq!(mode.value(), Some(Value::Index(1)));
        assert_eq!(mode.display().as_str(), "Normal");

        mode.set(2u16).unwrap();
        assert_eq!(mode.display().as_str(), "Fast");
        assert_eq!(mode.set(5u16), Err(AccessError::InvalidValue));

        let labels = mode.option_labels().unwrap();
        assert_eq!(&labels[..], &["Slow", "Normal", "Fast"]);
    }

    #[test]
    fn test_display_of_scalars() {
        let mut runtime = runtime();
        assert_eq!(runtime.state_by_name("Temp").unwrap().display().as_str(), "4.00");
        assert_eq!(runtime.state_by_name("Enabled").unwrap().display().as_str(), "OFF");
        assert_eq!(runtime.state_by_name("Reset").unwrap().display().as_str(), "");
    }

    #[test]
    fn test_invoke_action_only() {
        let mut runtime = runtime();
        runtime.state_by_name("Reset").unwrap().invoke().unwrap();
        assert_eq!(
            runtime.state_by_name("Enabled").unwrap().invoke(),
            Err(AccessError::NotSupported)
        );

        let mut reset = runtime.state_by_name("Reset").unwrap();
        assert_eq!(reset.save(), None);
        assert_eq!(reset.history_len(), 0);
        assert_eq!(reset.owner_name(), "chiller");
    }

    #[test]
    fn test_set_saves_to_history() {
        let mut runtime = runtime();
        let mut enabled = runtime.state_by_name("Enabled").unwrap();
        assert_eq!(enabled.history_len(), 1);
        enabled.set(true).unwrap();
        assert_eq!(enabled.history_len(), 2);
        assert_eq!(enabled.history(0), Some(Value::Bool(false)));
        assert_eq!(enabled.history(1), Some(Value::Bool(true)));
        assert_eq!(enabled.record_error(), None);
    }
}
