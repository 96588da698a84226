//! Native values inside value cells.
//!
//! A cell's native representation pairs a [`Descriptor`] with a payload. Inline
//! payloads own their value directly. Boxed payloads refer to an arena slot
//! through a [`HeapRef`], whose [`Ownership`] decides what duplicating and
//! dropping the cell does to the slot.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::error::ConversionError;
use crate::heap::{NativeValue, ObjectHandle, ObjectHeap, WeakHeap};
use crate::registry::Descriptor;

/// How a cell relates to the arena slot it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The cell owns a private copy. Duplicating deep-copies the value.
    Exclusive,
    /// The cell holds one counted reference. Duplicating adds a reference.
    Shared,
    /// The cell is a view onto a slot owned elsewhere.
    Borrowed,
}

/// A cell's claim on an arena slot.
pub(crate) struct HeapRef {
    heap: WeakHeap,
    handle: ObjectHandle,
    ownership: Ownership,
}

impl HeapRef {
    /// Wrap an already-counted reference (or a view, for `Borrowed`).
    pub(crate) fn new(heap: &ObjectHeap, handle: ObjectHandle, ownership: Ownership) -> Self {
        Self {
            heap: heap.downgrade(),
            handle,
            ownership,
        }
    }

    pub(crate) fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub(crate) fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub(crate) fn heap(&self) -> Option<ObjectHeap> {
        self.heap.upgrade()
    }

    pub(crate) fn view(&self) -> Self {
        Self {
            heap: self.heap.clone(),
            handle: self.handle,
            ownership: Ownership::Borrowed,
        }
    }
}

impl Drop for HeapRef {
    fn drop(&mut self) {
        if self.ownership == Ownership::Borrowed {
            return;
        }
        if let Some(heap) = self.heap.upgrade() {
            heap.release(self.handle);
        }
    }
}

pub(crate) enum Payload {
    Inline(NativeValue),
    Boxed(HeapRef),
}

/// Native representation stored in a value cell.
pub struct NativeRep {
    pub(crate) descriptor: Rc<Descriptor>,
    pub(crate) payload: Payload,
}

impl NativeRep {
    pub(crate) fn inline(descriptor: Rc<Descriptor>, value: NativeValue) -> Self {
        Self {
            descriptor,
            payload: Payload::Inline(value),
        }
    }

    pub(crate) fn boxed(
        descriptor: Rc<Descriptor>,
        heap: &ObjectHeap,
        handle: ObjectHandle,
        ownership: Ownership,
    ) -> Self {
        Self {
            descriptor,
            payload: Payload::Boxed(HeapRef::new(heap, handle, ownership)),
        }
    }

    pub fn descriptor(&self) -> &Rc<Descriptor> {
        &self.descriptor
    }

    /// Arena slot behind this value, if it is boxed.
    pub fn handle(&self) -> Option<ObjectHandle> {
        match &self.payload {
            Payload::Boxed(reference) => Some(reference.handle()),
            Payload::Inline(_) => None,
        }
    }

    pub fn ownership(&self) -> Ownership {
        match &self.payload {
            Payload::Boxed(reference) => reference.ownership(),
            Payload::Inline(_) => Ownership::Exclusive,
        }
    }

    pub(crate) fn duplicate(&self) -> Result<NativeRep, ConversionError> {
        Ok(NativeRep {
            descriptor: self.descriptor.clone(),
            payload: self.descriptor.duplicate(&self.payload)?,
        })
    }

    pub(crate) fn to_text(&self) -> String {
        self.descriptor.stringify(&self.payload)
    }

    /// The live value, or a stale-handle error.
    pub(crate) fn value(&self) -> Result<NativeValue, ConversionError> {
        match &self.payload {
            Payload::Inline(value) => Ok(value.clone()),
            Payload::Boxed(reference) => reference
                .heap()
                .and_then(|heap| heap.get(reference.handle()))
                .ok_or_else(|| self.descriptor.stale(reference.handle())),
        }
    }
}

impl fmt::Debug for NativeRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRep")
            .field("type", &self.descriptor.name())
            .field("handle", &self.handle())
            .field("ownership", &self.ownership())
            .finish()
    }
}

/// Typed access to a native value extracted from a cell.
///
/// Cloning a `Handle` shares the value. The value stays alive while any handle
/// to it exists, even after the cell or command that exposed it is gone.
pub struct Handle<T> {
    value: Rc<RefCell<T>>,
    slot: Option<ObjectHandle>,
    descriptor: Rc<Descriptor>,
}

impl<T: 'static> Handle<T> {
    pub(crate) fn from_value(
        value: NativeValue,
        slot: Option<ObjectHandle>,
        descriptor: Rc<Descriptor>,
    ) -> Result<Self, ConversionError> {
        let value = value.downcast::<RefCell<T>>().map_err(|_| {
            ConversionError::type_mismatch(descriptor.name(), std::any::type_name::<T>())
        })?;
        Ok(Self {
            value,
            slot,
            descriptor,
        })
    }

    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.value.borrow()
    }

    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.value.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, T>, ConversionError> {
        self.value.try_borrow().map_err(|_| self.busy())
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>, ConversionError> {
        self.value.try_borrow_mut().map_err(|_| self.busy())
    }

    fn busy(&self) -> ConversionError {
        ConversionError::Busy {
            type_name: self.descriptor.name().to_string(),
        }
    }

    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }

    /// Arena slot the value was found in. `None` for inline values.
    pub fn slot(&self) -> Option<ObjectHandle> {
        self.slot
    }

    pub fn descriptor(&self) -> &Rc<Descriptor> {
        &self.descriptor
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    pub(crate) fn erased(&self) -> NativeValue {
        self.value.clone()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            slot: self.slot,
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &self.descriptor.name())
            .field("slot", &self.slot)
            .finish()
    }
}
