//! Placing native values into value cells and getting them back out.

use std::any::type_name;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ConversionError;
use crate::heap::{NativeValue, ObjectHandle, ReleaseAction};
use crate::interp::Interp;
use crate::list;
use crate::native::{Handle, NativeRep, Ownership};
use crate::obj::Obj;
use crate::property::InterpProperty;
use crate::registry::{Descriptor, Flavor};

impl Interp {
    fn descriptor_for<T: 'static>(&self) -> Result<Rc<Descriptor>, ConversionError> {
        self.lookup::<T>()
            .ok_or_else(|| ConversionError::UnregisteredType {
                type_name: type_name::<T>().to_string(),
            })
    }

    /// Store `value` in `cell`. The cell must be unshared.
    ///
    /// Exclusive and shared cells own the value. A borrowed embedding leaves
    /// the arena holding the only owning reference; it stays alive until
    /// [`Interp::free_object`] is called with the returned handle.
    pub fn embed<T: 'static>(
        &self,
        cell: &Obj,
        value: T,
        ownership: Ownership,
    ) -> Result<Option<ObjectHandle>, ConversionError> {
        let descriptor = self.descriptor_for::<T>()?;
        if cell.is_shared() {
            return Err(ConversionError::SharedObject);
        }
        let value: NativeValue = Rc::new(RefCell::new(value));

        if descriptor.flavor() == Flavor::Inline && ownership == Ownership::Exclusive {
            cell.set_native(NativeRep::inline(descriptor, value))?;
            return Ok(None);
        }

        let handle = self.heap().allocate(value, descriptor.type_id());
        tracing::trace!(
            type_name = descriptor.name(),
            index = handle.index,
            ?ownership,
            "embedded native value"
        );
        cell.set_native(NativeRep::boxed(descriptor, self.heap(), handle, ownership))?;
        Ok(Some(handle))
    }

    /// Store `value` exclusively in `cell` and run `action` once the last
    /// owning cell releases it.
    pub fn embed_owned<T: 'static>(
        &self,
        cell: &Obj,
        value: T,
        action: ReleaseAction,
    ) -> Result<ObjectHandle, ConversionError> {
        let descriptor = self.descriptor_for::<T>()?;
        if cell.is_shared() {
            return Err(ConversionError::SharedObject);
        }
        let value: NativeValue = Rc::new(RefCell::new(value));
        let handle = self.heap().allocate(value, descriptor.type_id());
        self.heap().set_release_action(handle, action);
        cell.set_native(NativeRep::boxed(
            descriptor,
            self.heap(),
            handle,
            Ownership::Exclusive,
        ))?;
        Ok(handle)
    }

    /// A fresh cell holding `value`.
    pub fn new_object<T: 'static>(
        &self,
        value: T,
        ownership: Ownership,
    ) -> Result<Obj, ConversionError> {
        let cell = Obj::new();
        self.embed(&cell, value, ownership)?;
        Ok(cell)
    }

    /// A cell viewing an arena slot owned elsewhere.
    pub fn object_view(&self, descriptor: &Rc<Descriptor>, handle: ObjectHandle) -> Obj {
        Obj::from_native(NativeRep::boxed(
            descriptor.clone(),
            self.heap(),
            handle,
            Ownership::Borrowed,
        ))
    }

    /// A fresh cell taking over one counted reference to `handle`. The
    /// caller must already hold that reference (see [`Interp::pin_native`]).
    pub fn claim_object(
        &self,
        descriptor: &Rc<Descriptor>,
        handle: ObjectHandle,
        ownership: Ownership,
    ) -> Obj {
        Obj::from_native(NativeRep::boxed(
            descriptor.clone(),
            self.heap(),
            handle,
            ownership,
        ))
    }

    /// A cell exposing the value behind `handle`. Arena values get a borrowed
    /// view; inline values get a cell sharing the same value.
    pub fn handle_to_obj<T: 'static>(&self, handle: &Handle<T>) -> Obj {
        match handle.slot() {
            Some(slot) => self.object_view(handle.descriptor(), slot),
            None => Obj::from_native(NativeRep::inline(
                handle.descriptor().clone(),
                handle.erased(),
            )),
        }
    }

    /// Give the value in `cell` one more owning reference in the arena and
    /// return its slot. Inline values are moved into the arena first.
    pub fn pin_native(&self, cell: &Obj) -> Result<(Rc<Descriptor>, ObjectHandle), ConversionError> {
        let pinned = cell.with_native(|native| {
            let descriptor = native.descriptor().clone();
            match native.handle() {
                Some(handle) => {
                    if self.heap().add_ref(handle) {
                        Ok((descriptor, handle))
                    } else {
                        Err(descriptor.stale(handle))
                    }
                }
                None => {
                    let value = native.value()?;
                    let handle = self.heap().allocate(value, descriptor.type_id());
                    Ok((descriptor, handle))
                }
            }
        });
        pinned.unwrap_or_else(|| {
            Err(ConversionError::type_mismatch(
                "native object",
                cell.type_name(),
            ))
        })
    }

    /// Free an arena slot regardless of outstanding references.
    pub fn free_object(&self, handle: ObjectHandle) -> bool {
        self.heap().free(handle)
    }

    /// Native descriptor and slot behind a cell, if any.
    pub fn native_slot(&self, cell: &Obj) -> Option<(Rc<Descriptor>, Option<ObjectHandle>)> {
        cell.with_native(|native| (native.descriptor().clone(), native.handle()))
    }

    /// Whether `cell` can be read as a `T` without error.
    pub fn holds<T: 'static>(&self, cell: &Obj) -> bool {
        self.extract::<T>(cell).is_ok()
    }

    /// Typed access to the native value in `cell`.
    ///
    /// Tries, in order: the cell's own native representation; its string
    /// form as a handle token; and, when enabled, the sole element of a
    /// one-element list.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn extract<T: 'static>(&self, cell: &Obj) -> Result<Handle<T>, ConversionError> {
        let descriptor = self.descriptor_for::<T>()?;

        if let Some(found) = self.extract_single::<T>(cell, &descriptor)? {
            return Ok(found);
        }

        if self.flag(InterpProperty::UnwrapSingletonLists) && !cell.is_native() {
            if cell.is_list_rep() {
                let len = cell.list_len()?;
                if len == 1
                    && let Some(element) = cell.list_index(0)?
                    && let Some(found) = self.extract_single::<T>(&element, &descriptor)?
                {
                    return Ok(found);
                }
                if len > 1 {
                    return Err(ConversionError::AmbiguousList {
                        expected: descriptor.name().to_string(),
                        len,
                    });
                }
            } else if let Ok(mut words) = list::parse(&cell.as_rc_str())
                && words.len() == 1
                && let Some(word) = words.pop()
                && let Some(found) = self.extract_single::<T>(&Obj::from(word), &descriptor)?
            {
                // parsed without caching so the cell keeps its own rep
                return Ok(found);
            }
        }

        Err(ConversionError::type_mismatch(
            descriptor.name(),
            cell.type_name(),
        ))
    }

    fn extract_single<T: 'static>(
        &self,
        cell: &Obj,
        descriptor: &Rc<Descriptor>,
    ) -> Result<Option<Handle<T>>, ConversionError> {
        let direct = cell.with_native(|native| {
            if native.descriptor().hash() != descriptor.hash() {
                return Ok(None);
            }
            let value = native.value()?;
            Handle::from_value(value, native.handle(), descriptor.clone()).map(Some)
        });
        if let Some(result) = direct {
            return result;
        }

        let text = cell.as_rc_str();
        let Some(handle) = descriptor.parse_token(&text) else {
            return Ok(None);
        };
        if self.heap().type_id(handle) != Some(descriptor.type_id()) {
            return Err(descriptor.stale(handle));
        }
        let Some(value) = self.heap().get(handle) else {
            return Err(descriptor.stale(handle));
        };
        cell.cache_native(NativeRep::boxed(
            descriptor.clone(),
            self.heap(),
            handle,
            Ownership::Borrowed,
        ));
        Handle::from_value(value, Some(handle), descriptor.clone()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        drops: Rc<Cell<u32>>,
        value: i64,
    }

    impl Drop for Counter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Pt(i32, i32);

    fn setup() -> (Interp, Rc<Cell<u32>>) {
        let interp = Interp::new();
        interp.register_as::<Counter>("Counter").unwrap();
        interp.register_copyable_as::<Pt>("Pt").unwrap();
        (interp, Rc::new(Cell::new(0)))
    }

    #[test]
    fn exclusive_cell_owns_value() {
        let (interp, drops) = setup();
        let cell = interp
            .new_object(Counter { drops: drops.clone(), value: 7 }, Ownership::Exclusive)
            .unwrap();
        assert_eq!(interp.extract::<Counter>(&cell).unwrap().borrow().value, 7);
        drop(cell);
        assert_eq!(drops.get(), 1);
        assert_eq!(interp.heap().live_count(), 0);
    }

    #[test]
    fn shared_duplicate_adds_reference() {
        let (interp, drops) = setup();
        let cell = interp
            .new_object(Counter { drops: drops.clone(), value: 1 }, Ownership::Shared)
            .unwrap();
        let copy = cell.duplicate().unwrap();
        let a = interp.extract::<Counter>(&cell).unwrap();
        let b = interp.extract::<Counter>(&copy).unwrap();
        assert!(a.ptr_eq(&b));
        drop((a, b));
        drop(cell);
        assert_eq!(drops.get(), 0);
        drop(copy);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn exclusive_duplicate_of_non_copyable_fails() {
        let (interp, drops) = setup();
        let cell = interp
            .new_object(Counter { drops, value: 1 }, Ownership::Exclusive)
            .unwrap();
        assert!(matches!(
            cell.duplicate(),
            Err(ConversionError::NotCopyable { .. })
        ));
    }

    #[test]
    fn inline_values_copy_on_duplicate() {
        let (interp, _) = setup();
        let cell = interp.new_object(Pt(1, 2), Ownership::Exclusive).unwrap();
        assert!(interp.native_slot(&cell).unwrap().1.is_none());
        let copy = cell.duplicate().unwrap();
        interp.extract::<Pt>(&copy).unwrap().borrow_mut().0 = 9;
        assert_eq!(*interp.extract::<Pt>(&cell).unwrap().borrow(), Pt(1, 2));
        assert_eq!(*interp.extract::<Pt>(&copy).unwrap().borrow(), Pt(9, 2));
    }

    #[test]
    fn token_string_recovers_value() {
        let (interp, drops) = setup();
        let owner = interp
            .new_object(Counter { drops, value: 3 }, Ownership::Exclusive)
            .unwrap();
        let token = Obj::from(owner.as_string());
        assert!(token.as_string().starts_with("Counter#"));
        assert_eq!(interp.extract::<Counter>(&token).unwrap().borrow().value, 3);
        assert!(token.is_native());
        drop(owner);
        let err = interp.extract::<Counter>(&token).unwrap_err();
        assert!(matches!(err, ConversionError::StaleHandle { .. }));
    }

    #[test]
    fn singleton_list_fallback() {
        let (interp, _) = setup();
        let pt = interp.new_object(Pt(4, 5), Ownership::Exclusive).unwrap();
        let single = Obj::from_list(vec![pt.clone()]);
        assert_eq!(interp.extract::<Pt>(&single).unwrap().borrow().0, 4);

        let pair = Obj::from_list(vec![pt.clone(), pt]);
        assert!(matches!(
            interp.extract::<Pt>(&pair),
            Err(ConversionError::AmbiguousList { len: 2, .. })
        ));

        interp.set_property(InterpProperty::UnwrapSingletonLists, 0);
        assert!(matches!(
            interp.extract::<Pt>(&single),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn braced_token_string_unwraps() {
        let (interp, drops) = setup();
        let owner = interp
            .new_object(Counter { drops, value: 8 }, Ownership::Exclusive)
            .unwrap();
        let braced = Obj::from(format!("{{{}}}", owner.as_string()));
        assert!(!braced.is_list_rep());
        assert_eq!(interp.extract::<Counter>(&braced).unwrap().borrow().value, 8);
        assert_eq!(braced.type_name(), "string");

        let unbalanced = Obj::from(format!("{{{}", owner.as_string()));
        assert!(matches!(
            interp.extract::<Counter>(&unbalanced),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn mismatch_names_both_types() {
        let (interp, _) = setup();
        let err = interp.extract::<Pt>(&Obj::from_int(3)).unwrap_err();
        assert_eq!(err.to_string(), "expected Pt but got int");
        let err = interp.extract::<String>(&Obj::from("x")).unwrap_err();
        assert!(matches!(err, ConversionError::UnregisteredType { .. }));
    }

    #[test]
    fn owned_release_queues_retraction() {
        let (interp, drops) = setup();
        let cell = Obj::new();
        interp
            .embed_owned(
                &cell,
                Counter { drops: drops.clone(), value: 0 },
                ReleaseAction::RetractCommand("obj".into()),
            )
            .unwrap();
        interp.create_command("obj", Rc::new(|_, _| Ok(Obj::new())));
        drop(cell);
        assert_eq!(drops.get(), 1);
        interp.retract_released_commands();
        assert!(!interp.has_command("obj"));
    }

    #[test]
    fn pin_moves_inline_into_arena() {
        let (interp, _) = setup();
        let cell = interp.new_object(Pt(1, 1), Ownership::Exclusive).unwrap();
        let (descriptor, handle) = interp.pin_native(&cell).unwrap();
        assert_eq!(descriptor.name(), "Pt");
        let view = interp.object_view(&descriptor, handle);
        interp.extract::<Pt>(&view).unwrap().borrow_mut().1 = 8;
        assert_eq!(interp.extract::<Pt>(&cell).unwrap().borrow().1, 8);
        assert!(interp.free_object(handle));
        assert!(interp.extract::<Pt>(&view).is_err());
    }

    #[test]
    fn claimed_cell_releases_its_reference() {
        let (interp, drops) = setup();
        let cell = interp
            .new_object(Counter { drops: drops.clone(), value: 2 }, Ownership::Shared)
            .unwrap();
        let (descriptor, handle) = interp.pin_native(&cell).unwrap();
        let claimed = interp.claim_object(&descriptor, handle, Ownership::Shared);
        drop(cell);
        assert_eq!(interp.heap().ref_count(handle), Some(1));
        assert_eq!(interp.extract::<Counter>(&claimed).unwrap().borrow().value, 2);
        drop(claimed);
        assert_eq!(drops.get(), 1);
    }
}
