//! Exposed state variants
//!
//! An exposed state binds a name and a kind to a field of its owning
//! component. The binding is a pair of plain accessor functions fixed at
//! construction, never an address into the component, so the runtime can
//! own and move components freely.
//!
//! The set of kinds is closed:
//!
//! | Kind                 | Types          | Persisted        |
//! |----------------------|----------------|------------------|
//! | `ReadOnly`           | f64, i32, bool | value            |
//! | `ReadWrite`          | f64, i32, bool | value            |
//! | `RangedReadWrite`    | f64, i32       | value (clamped)  |
//! | `SelectionReadWrite` | f64, i32       | option index     |
//! | `Action`             | -              | no               |

use core::any::{Any, TypeId};

use super::selection::{OptionLabels, Selection};
use super::value::{StateValue, Value, ValueType};
use crate::persist::Record;

/// Kind of an exposed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateKind {
    ReadOnly,
    ReadWrite,
    RangedReadWrite,
    SelectionReadWrite,
    Action,
}

impl StateKind {
    /// Check if external writes are accepted
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            StateKind::ReadWrite | StateKind::RangedReadWrite | StateKind::SelectionReadWrite
        )
    }

    /// Check if the kind carries a persisted value
    pub fn is_persisted(&self) -> bool {
        !matches!(self, StateKind::Action)
    }
}

/// Errors from the generic accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessError {
    /// Requested type differs from the state's type tag
    TypeMismatch,
    /// State does not accept external writes
    ReadOnly,
    /// Operation not supported by this kind
    NotSupported,
    /// Value rejected (NaN, no such option)
    InvalidValue,
    /// Owning component is not of the bound type
    OwnerMismatch,
    /// No state with that identifier or name
    UnknownState,
}

/// How a write landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Applied {
    /// Value stored as given
    Exact,
    /// Value clamped into the state's bounds
    Clamped,
}

/// Read/write capability for one field of a component
pub struct Accessor<C, T> {
    pub get: fn(&C) -> T,
    pub set: fn(&mut C, T),
}

impl<C, T> Clone for Accessor<C, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, T> Copy for Accessor<C, T> {}

impl<C, T> Accessor<C, T> {
    /// Bind a getter/setter pair
    pub const fn new(get: fn(&C) -> T, set: fn(&mut C, T)) -> Self {
        Self { get, set }
    }
}

/// Inclusive bounds and step size of a ranged state
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
    pub step: T,
}

impl<T: Copy + PartialOrd> Bounds<T> {
    /// Clamp `value` into `[min, max]`
    pub fn clamp(&self, value: T) -> (T, Applied) {
        if value < self.min {
            (self.min, Applied::Clamped)
        } else if value > self.max {
            (self.max, Applied::Clamped)
        } else {
            (value, Applied::Exact)
        }
    }
}

/// Bounds as tagged values, for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeInfo {
    pub min: Value,
    pub max: Value,
    pub step: Value,
}

/// Plain field of one of the scalar types
pub enum Field<C> {
    Double(Accessor<C, f64>),
    Int(Accessor<C, i32>),
    Bool(Accessor<C, bool>),
}

/// Field constrained to inclusive bounds
pub enum RangedField<C> {
    Double(Accessor<C, f64>, Bounds<f64>),
    Int(Accessor<C, i32>, Bounds<i32>),
}

/// Field holding one option of a selection
pub enum SelectionField<C> {
    Double(Accessor<C, f64>, Selection<f64>),
    Int(Accessor<C, i32>, Selection<i32>),
}

/// The closed set of state kinds and their bindings
pub enum Binding<C> {
    ReadOnly(Field<C>),
    ReadWrite(Field<C>),
    RangedReadWrite(RangedField<C>),
    SelectionReadWrite(SelectionField<C>),
    Action(fn(&mut C)),
}

/// Scalar types usable as plain state fields
pub trait Scalar: StateValue + Record {
    /// Wrap an accessor into the matching field variant
    fn field<C>(accessor: Accessor<C, Self>) -> Field<C>;
}

impl Scalar for f64 {
    fn field<C>(accessor: Accessor<C, Self>) -> Field<C> {
        Field::Double(accessor)
    }
}

impl Scalar for i32 {
    fn field<C>(accessor: Accessor<C, Self>) -> Field<C> {
        Field::Int(accessor)
    }
}

impl Scalar for bool {
    fn field<C>(accessor: Accessor<C, Self>) -> Field<C> {
        Field::Bool(accessor)
    }
}

/// Numeric types usable in ranged and selection states
pub trait Numeric: Scalar + PartialOrd {
    /// Wrap an accessor and bounds into the matching ranged variant
    fn ranged<C>(accessor: Accessor<C, Self>, bounds: Bounds<Self>) -> RangedField<C>;

    /// Wrap an accessor and options into the matching selection variant
    fn selection<C>(accessor: Accessor<C, Self>, options: Selection<Self>) -> SelectionField<C>;
}

impl Numeric for f64 {
    fn ranged<C>(accessor: Accessor<C, Self>, bounds: Bounds<Self>) -> RangedField<C> {
        RangedField::Double(accessor, bounds)
    }

    fn selection<C>(accessor: Accessor<C, Self>, options: Selection<Self>) -> SelectionField<C> {
        SelectionField::Double(accessor, options)
    }
}

impl Numeric for i32 {
    fn ranged<C>(accessor: Accessor<C, Self>, bounds: Bounds<Self>) -> RangedField<C> {
        RangedField::Int(accessor, bounds)
    }

    fn selection<C>(accessor: Accessor<C, Self>, options: Selection<Self>) -> SelectionField<C> {
        SelectionField::Int(accessor, options)
    }
}

/// A named, typed, introspectable variable of a component of type `C`
pub struct ExposedState<C> {
    name: &'static str,
    binding: Binding<C>,
}

impl<C: 'static> ExposedState<C> {
    /// Value the component computes; restored from storage at boot
    pub fn read_only<T: Scalar>(
        name: &'static str,
        get: fn(&C) -> T,
        set: fn(&mut C, T),
    ) -> Self {
        Self {
            name,
            binding: Binding::ReadOnly(T::field(Accessor::new(get, set))),
        }
    }

    /// Value that can also be set externally
    pub fn read_write<T: Scalar>(
        name: &'static str,
        get: fn(&C) -> T,
        set: fn(&mut C, T),
    ) -> Self {
        Self {
            name,
            binding: Binding::ReadWrite(T::field(Accessor::new(get, set))),
        }
    }

    /// Settable value confined to `[min, max]`
    ///
    /// `min` and `max` are swapped if given in the wrong order.
    pub fn ranged<T: Numeric>(
        name: &'static str,
        get: fn(&C) -> T,
        set: fn(&mut C, T),
        min: T,
        max: T,
        step: T,
    ) -> Self {
        let (min, max) = if max < min { (max, min) } else { (min, max) };
        Self {
            name,
            binding: Binding::RangedReadWrite(T::ranged(
                Accessor::new(get, set),
                Bounds { min, max, step },
            )),
        }
    }

    /// Value drawn from a fixed list of options; persisted as an index
    pub fn selection<T: Numeric>(
        name: &'static str,
        get: fn(&C) -> T,
        set: fn(&mut C, T),
        options: Selection<T>,
    ) -> Self {
        Self {
            name,
            binding: Binding::SelectionReadWrite(T::selection(Accessor::new(get, set), options)),
        }
    }

    /// Operation on the component, invoked on demand
    pub fn action(name: &'static str, run: fn(&mut C)) -> Self {
        Self {
            name,
            binding: Binding::Action(run),
        }
    }

    /// Binding of this state
    pub fn binding(&self) -> &Binding<C> {
        &self.binding
    }

    fn owner<'a>(&self, owner: &'a dyn Any) -> Result<&'a C, AccessError> {
        owner.downcast_ref::<C>().ok_or(AccessError::OwnerMismatch)
    }

    fn owner_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<&'a mut C, AccessError> {
        owner.downcast_mut::<C>().ok_or(AccessError::OwnerMismatch)
    }

    /// Store a value, bypassing the read-only restriction
    fn apply(&self, owner: &mut C, value: Value) -> Result<Applied, AccessError> {
        match (&self.binding, value) {
            (Binding::ReadOnly(field) | Binding::ReadWrite(field), value) => {
                match (field, value) {
                    (Field::Double(a), Value::Double(v)) => (a.set)(owner, v),
                    (Field::Int(a), Value::Int(v)) => (a.set)(owner, v),
                    (Field::Bool(a), Value::Bool(v)) => (a.set)(owner, v),
                    _ => return Err(AccessError::TypeMismatch),
                }
                Ok(Applied::Exact)
            }
            (Binding::RangedReadWrite(RangedField::Double(a, bounds)), Value::Double(v)) => {
                if v.is_nan() {
                    return Err(AccessError::InvalidValue);
                }
                let (v, applied) = bounds.clamp(v);
                (a.set)(owner, v);
                Ok(applied)
            }
            (Binding::RangedReadWrite(RangedField::Int(a, bounds)), Value::Int(v)) => {
                let (v, applied) = bounds.clamp(v);
                (a.set)(owner, v);
                Ok(applied)
            }
            (Binding::SelectionReadWrite(field), Value::Index(i)) => {
                let i = usize::from(i);
                match field {
                    SelectionField::Double(a, sel) => {
                        (a.set)(owner, sel.value_at(i).ok_or(AccessError::InvalidValue)?)
                    }
                    SelectionField::Int(a, sel) => {
                        (a.set)(owner, sel.value_at(i).ok_or(AccessError::InvalidValue)?)
                    }
                }
                Ok(Applied::Exact)
            }
            (Binding::Action(_), _) => Err(AccessError::NotSupported),
            _ => Err(AccessError::TypeMismatch),
        }
    }
}

/// Type-erased view of an exposed state, over any owner type
pub(crate) trait DynState: Send {
    fn name(&self) -> &'static str;
    fn kind(&self) -> StateKind;
    fn value_type(&self) -> ValueType;
    fn owner_type(&self) -> TypeId;

    /// Current value, as persisted (selection: option index)
    ///
    /// `None` for actions, or a selection whose field holds no listed option.
    fn read(&self, owner: &dyn Any) -> Option<Value>;

    /// External write; read-only states refuse
    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<Applied, AccessError>;

    /// Hydrate from storage; accepted by every persisted kind
    fn restore(&self, owner: &mut dyn Any, value: Value) -> Result<Applied, AccessError>;

    fn invoke(&self, owner: &mut dyn Any) -> Result<(), AccessError>;

    /// Label for a selection index
    fn option_label(&self, index: u16) -> Option<&'static str>;
    fn option_labels(&self) -> Option<OptionLabels>;
    fn range(&self) -> Option<RangeInfo>;
}

impl<C: 'static> DynState for ExposedState<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> StateKind {
        match self.binding {
            Binding::ReadOnly(_) => StateKind::ReadOnly,
            Binding::ReadWrite(_) => StateKind::ReadWrite,
            Binding::RangedReadWrite(_) => StateKind::RangedReadWrite,
            Binding::SelectionReadWrite(_) => StateKind::SelectionReadWrite,
            Binding::Action(_) => StateKind::Action,
        }
    }

    fn value_type(&self) -> ValueType {
        match &self.binding {
            Binding::ReadOnly(field) | Binding::ReadWrite(field) => match field {
                Field::Double(_) => ValueType::Double,
                Field::Int(_) => ValueType::Int,
                Field::Bool(_) => ValueType::Bool,
            },
            Binding::RangedReadWrite(RangedField::Double(..)) => ValueType::Double,
            Binding::RangedReadWrite(RangedField::Int(..)) => ValueType::Int,
            Binding::SelectionReadWrite(_) => ValueType::Index,
            Binding::Action(_) => ValueType::Unknown,
        }
    }

    fn owner_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn read(&self, owner: &dyn Any) -> Option<Value> {
        let owner = self.owner(owner).ok()?;
        match &self.binding {
            Binding::ReadOnly(field) | Binding::ReadWrite(field) => Some(match field {
                Field::Double(a) => Value::Double((a.get)(owner)),
                Field::Int(a) => Value::Int((a.get)(owner)),
                Field::Bool(a) => Value::Bool((a.get)(owner)),
            }),
            Binding::RangedReadWrite(RangedField::Double(a, _)) => {
                Some(Value::Double((a.get)(owner)))
            }
            Binding::RangedReadWrite(RangedField::Int(a, _)) => Some(Value::Int((a.get)(owner))),
            Binding::SelectionReadWrite(field) => {
                let index = match field {
                    SelectionField::Double(a, sel) => sel.index_of((a.get)(owner)),
                    SelectionField::Int(a, sel) => sel.index_of((a.get)(owner)),
                }?;
                u16::try_from(index).ok().map(Value::Index)
            }
            Binding::Action(_) => None,
        }
    }

    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<Applied, AccessError> {
        match self.kind() {
            StateKind::ReadOnly => Err(AccessError::ReadOnly),
            StateKind::Action => Err(AccessError::NotSupported),
            _ => self.restore(owner, value),
        }
    }

    fn restore(&self, owner: &mut dyn Any, value: Value) -> Result<Applied, AccessError> {
        let owner = self.owner_mut(owner)?;
        self.apply(owner, value)
    }

    fn invoke(&self, owner: &mut dyn Any) -> Result<(), AccessError> {
        match self.binding {
            Binding::Action(run) => {
                run(self.owner_mut(owner)?);
                Ok(())
            }
            _ => Err(AccessError::NotSupported),
        }
    }

    fn option_label(&self, index: u16) -> Option<&'static str> {
        match &self.binding {
            Binding::SelectionReadWrite(SelectionField::Double(_, sel)) => {
                sel.label_at(usize::from(index))
            }
            Binding::SelectionReadWrite(SelectionField::Int(_, sel)) => {
                sel.label_at(usize::from(index))
            }
            _ => None,
        }
    }

    fn option_labels(&self) -> Option<OptionLabels> {
        match &self.binding {
            Binding::SelectionReadWrite(SelectionField::Double(_, sel)) => Some(sel.labels()),
            Binding::SelectionReadWrite(SelectionField::Int(_, sel)) => Some(sel.labels()),
            _ => None,
        }
    }

    fn range(&self) -> Option<RangeInfo> {
        match &self.binding {
            Binding::RangedReadWrite(RangedField::Double(_, b)) => Some(RangeInfo {
                min: Value::Double(b.min),
                max: Value::Double(b.max),
                step: Value::Double(b.step),
            }),
            Binding::RangedReadWrite(RangedField::Int(_, b)) => Some(RangeInfo {
                min: Value::Int(b.min),
                max: Value::Int(b.max),
                step: Value::Int(b.step),
            }),
            _ => None,
        }
    }
}
