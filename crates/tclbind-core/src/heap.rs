//! Generational arena for embedded native objects.
//!
//! Boxed native values live here rather than inside the value cells that
//! mention them. A cell holds an [`ObjectHandle`] plus an ownership mode; the
//! arena counts owning references and frees a slot when the last one goes.
//! Freed slots bump their generation so stale handles are detected instead of
//! aliasing a later occupant.
//!
//! The arena is shared by cheap clones. Values are always removed from a slot
//! before being dropped, so a value whose destructor releases further objects
//! never re-enters an active borrow.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Type-erased native value. The concrete type is always `RefCell<T>`.
pub type NativeValue = Rc<dyn Any>;

/// Handle to an arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into the slot vector
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Side effect run when a slot is freed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseAction {
    /// Queue the named command for removal from the interpreter.
    RetractCommand(String),
}

/// Shared arena handle.
#[derive(Clone, Default)]
pub struct ObjectHeap {
    inner: Rc<HeapInner>,
}

#[derive(Default)]
struct HeapInner {
    state: RefCell<HeapState>,
    /// Releases requested while the state was borrowed
    deferred: RefCell<Vec<ObjectHandle>>,
}

#[derive(Default)]
struct HeapState {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    retired: Vec<String>,
}

struct HeapSlot {
    generation: u32,
    value: Option<NativeValue>,
    type_id: Option<TypeId>,
    ref_count: u32,
    on_release: Option<ReleaseAction>,
}

impl HeapState {
    fn live(&self, handle: ObjectHandle) -> Option<&HeapSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    fn live_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapSlot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    fn release(&mut self, handle: ObjectHandle) -> Option<NativeValue> {
        let slot = self.live_mut(handle)?;
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count > 0 {
            return None;
        }
        self.take(handle)
    }

    fn take(&mut self, handle: ObjectHandle) -> Option<NativeValue> {
        let slot = self.live_mut(handle)?;
        let value = slot.value.take();
        slot.type_id = None;
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        let action = slot.on_release.take();
        self.free_list.push(handle.index);
        if let Some(ReleaseAction::RetractCommand(name)) = action {
            self.retired.push(name);
        }
        value
    }
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value with one owning reference.
    pub fn allocate(&self, value: NativeValue, type_id: TypeId) -> ObjectHandle {
        let mut state = self.inner.state.borrow_mut();
        if let Some(index) = state.free_list.pop() {
            let slot = &mut state.slots[index as usize];
            slot.value = Some(value);
            slot.type_id = Some(type_id);
            slot.ref_count = 1;
            slot.on_release = None;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = state.slots.len() as u32;
            state.slots.push(HeapSlot {
                generation: 0,
                value: Some(value),
                type_id: Some(type_id),
                ref_count: 1,
                on_release: None,
            });
            ObjectHandle::new(index, 0)
        }
    }

    /// The value behind a live handle.
    pub fn get(&self, handle: ObjectHandle) -> Option<NativeValue> {
        let state = self.inner.state.borrow();
        state.live(handle).and_then(|slot| slot.value.clone())
    }

    pub fn type_id(&self, handle: ObjectHandle) -> Option<TypeId> {
        let state = self.inner.state.borrow();
        state.live(handle).and_then(|slot| slot.type_id)
    }

    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.inner.state.borrow().live(handle).is_some()
    }

    /// Increment reference count.
    pub fn add_ref(&self, handle: ObjectHandle) -> bool {
        let mut state = self.inner.state.borrow_mut();
        match state.live_mut(handle) {
            Some(slot) => {
                slot.ref_count = slot.ref_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement reference count, free if zero.
    ///
    /// Returns true if the object was freed.
    pub fn release(&self, handle: ObjectHandle) -> bool {
        let freed = match self.inner.state.try_borrow_mut() {
            Ok(mut state) => state.release(handle),
            Err(_) => {
                tracing::trace!(index = handle.index, "deferring release");
                self.inner.deferred.borrow_mut().push(handle);
                return false;
            }
        };
        let was_freed = freed.is_some();
        drop(freed);
        self.flush_deferred();
        was_freed
    }

    /// Free a slot regardless of its reference count.
    ///
    /// Remaining references become stale. Returns true if a live slot was freed.
    pub fn free(&self, handle: ObjectHandle) -> bool {
        let freed = self.inner.state.borrow_mut().take(handle);
        let was_freed = freed.is_some();
        drop(freed);
        self.flush_deferred();
        was_freed
    }

    fn flush_deferred(&self) {
        loop {
            let next = self.inner.deferred.borrow_mut().pop();
            let Some(handle) = next else { break };
            let freed = match self.inner.state.try_borrow_mut() {
                Ok(mut state) => state.release(handle),
                Err(_) => {
                    self.inner.deferred.borrow_mut().push(handle);
                    break;
                }
            };
            drop(freed);
        }
    }

    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.inner.state.borrow().live(handle).map(|slot| slot.ref_count)
    }

    /// Attach an action to run when the slot is freed.
    pub fn set_release_action(&self, handle: ObjectHandle, action: ReleaseAction) -> bool {
        let mut state = self.inner.state.borrow_mut();
        match state.live_mut(handle) {
            Some(slot) => {
                slot.on_release = Some(action);
                true
            }
            None => false,
        }
    }

    /// Drain command names queued by [`ReleaseAction::RetractCommand`].
    pub fn take_retired(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.state.borrow_mut().retired)
    }

    pub fn live_count(&self) -> usize {
        let state = self.inner.state.borrow();
        state.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    pub(crate) fn downgrade(&self) -> WeakHeap {
        WeakHeap(Rc::downgrade(&self.inner))
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ObjectHeap")
            .field("slot_count", &state.slots.len())
            .field("free_count", &state.free_list.len())
            .finish()
    }
}

/// Non-owning arena handle held by value cells.
#[derive(Clone)]
pub(crate) struct WeakHeap(Weak<HeapInner>);

impl WeakHeap {
    pub(crate) fn upgrade(&self) -> Option<ObjectHeap> {
        self.0.upgrade().map(|inner| ObjectHeap { inner })
    }
}
