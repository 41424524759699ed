//! Component trait
//!
//! A component is a unit of control logic with one periodic operation. It
//! is constructed once at startup, handed to the registry, and updated on
//! every tick for the rest of the process lifetime.

use core::any::{Any, TypeId};

use crate::runtime::TickContext;

/// Periodically updated control unit
///
/// Drivers deliver fresh readings through `update`; calibration and unit
/// conversion stay inside the component.
pub trait Component: Send + 'static {
    /// Display name
    fn name(&self) -> &'static str;

    /// Called once per tick, in registration order
    ///
    /// Must return well within the tick period and must not block on I/O.
    fn update(&mut self, ctx: &mut TickContext<'_>);
}

/// Object-safe view of a component that can be downcast for state access
pub(crate) trait DynComponent: Send {
    fn name(&self) -> &'static str;
    fn update(&mut self, ctx: &mut TickContext<'_>);
    fn owner_type(&self) -> TypeId;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> DynComponent for C {
    fn name(&self) -> &'static str {
        Component::name(self)
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        Component::update(self, ctx)
    }

    fn owner_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
