//! Exposed state family
//!
//! Components declare their introspectable variables here; the runtime
//! persists them and the presentation layer reaches them through
//! [`StateHandle`].

pub mod access;
pub mod exposed;
pub mod selection;
pub mod value;

pub use access::StateHandle;
pub use exposed::{
    AccessError, Accessor, Applied, Binding, Bounds, ExposedState, Field, Numeric, RangeInfo,
    RangedField, Scalar, SelectionField, StateKind,
};
pub use selection::{OptionLabels, Selection, TooManyOptions, MAX_OPTIONS};
pub use value::{DisplayString, StateValue, Value, ValueType};
