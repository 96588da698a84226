//! Exposing native classes.
//!
//! A class is a registered native type plus a constructor command and a
//! method table. Each object created through the constructor (or any other
//! factory binding for the class) gets its own handle command named by the
//! object's token:
//!
//! ```text
//! set p [Point 1 2]
//! $p move 3 4
//! $p -delete
//! ```
//!
//! By default the handle command owns the object and `-delete` (or deleting
//! the command any other way) frees it. A [`ClassBuilder::value_owned`]
//! class inverts this: the returned value owns the object and the command is
//! retracted once the last owning value is released.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tclbind_core::{
    CommandProc, ConversionError, Descriptor, Interp, Obj, ObjectHandle, Ownership,
    RegistrationError, ReleaseAction, TclError,
};

use crate::callable::{IntoConstructor, IntoMethod};
use crate::dispatch::{CallKind, Callback};
use crate::overload::{self, OverloadSet};
use crate::policies::Policies;

/// Classes of one interpreter, by class name.
#[derive(Default)]
pub(crate) struct ClassTable {
    classes: RefCell<FxHashMap<String, Rc<ClassHandler>>>,
}

impl ClassTable {
    fn get(&self, name: &str) -> Option<Rc<ClassHandler>> {
        self.classes.borrow().get(name).cloned()
    }
}

pub(crate) struct ClassHandler {
    name: String,
    descriptor: Rc<Descriptor>,
    constructors: Rc<RefCell<OverloadSet>>,
    methods: RefCell<FxHashMap<String, Rc<RefCell<OverloadSet>>>>,
    value_owned: Cell<bool>,
}

impl ClassHandler {
    fn method_set(&self, method: &str) -> Option<Rc<RefCell<OverloadSet>>> {
        self.methods.borrow().get(method).cloned()
    }

    /// Give `result` a handle command and return the cell the caller sees.
    fn adopt(self: &Rc<Self>, interp: &Interp, result: Obj) -> Result<Obj, TclError> {
        let matches = interp
            .native_slot(&result)
            .is_some_and(|(descriptor, _)| descriptor.hash() == self.descriptor.hash());
        if !matches {
            return Err(ConversionError::type_mismatch(&self.name, result.type_name()).into());
        }

        let (descriptor, slot) = interp.pin_native(&result)?;
        let token = descriptor.token(slot);
        let command = self.object_command(descriptor.clone(), slot);

        if self.value_owned.get() {
            let owner = interp.claim_object(&descriptor, slot, Ownership::Shared);
            interp
                .heap()
                .set_release_action(slot, ReleaseAction::RetractCommand(token.clone()));
            interp.create_command(&token, command);
            tracing::debug!(class = %self.name, %token, "value-owned object created");
            return Ok(owner);
        }

        let heap = interp.heap().clone();
        interp.create_command_with_delete(
            &token,
            command,
            Box::new(move |_| {
                heap.release(slot);
            }),
        );
        tracing::debug!(class = %self.name, %token, "object created");
        Ok(interp.object_view(&descriptor, slot))
    }

    fn object_command(self: &Rc<Self>, descriptor: Rc<Descriptor>, slot: ObjectHandle) -> CommandProc {
        let class = self.clone();
        Rc::new(move |interp: &Interp, objv: &[Obj]| {
            let [this, method, ..] = objv else {
                let this = objv.first().map(Obj::as_string).unwrap_or_default();
                return Err(TclError::wrong_args(format!("{this} method ?arg ...?")));
            };
            let method = method.as_rc_str();
            if &*method == "-delete" {
                interp.delete_command(&this.as_rc_str());
                if class.value_owned.get() {
                    interp.free_object(slot);
                }
                return Ok(Obj::new());
            }
            let Some(set) = class.method_set(&method) else {
                return Err(TclError::UnknownMethod {
                    method: method.to_string(),
                });
            };
            let receiver = interp.object_view(&descriptor, slot);
            overload::dispatch(interp, &set, objv, Some(receiver))
        })
    }
}

/// Post-process a factory result: look up `class` and adopt the object.
pub(crate) fn adopt(interp: &Interp, class: &str, result: Obj) -> Result<Obj, TclError> {
    let Some(handler) = interp.assoc_data::<ClassTable>().get(class) else {
        return Err(TclError::FactoryUnknownClass {
            class: class.to_string(),
        });
    };
    handler.adopt(interp, result)
}

// =============================================================================
// ClassBuilder
// =============================================================================

/// Builder for registering a native class.
///
/// # Example
///
/// ```ignore
/// interp
///     .class::<Point>("Point")?
///     .constructor(|x: f64, y: f64| Point { x, y })?
///     .method("x", |p: &Point| p.x)?
///     .method("move", |p: &mut Point, dx: f64, dy: f64| {
///         p.x += dx;
///         p.y += dy;
///     })?;
/// ```
pub struct ClassBuilder<C> {
    interp: Interp,
    handler: Rc<ClassHandler>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: 'static> ClassBuilder<C> {
    /// Register `C` under `name`, or reopen the class if it exists.
    pub(crate) fn new(interp: &Interp, name: &str) -> Result<Self, RegistrationError> {
        let descriptor = interp.register_as::<C>(name)?;
        let table = interp.assoc_data::<ClassTable>();
        let existing = table.get(name);
        let handler = match existing {
            Some(handler) => handler,
            None => {
                let handler = Rc::new(ClassHandler {
                    name: name.to_string(),
                    descriptor,
                    constructors: Rc::new(RefCell::new(OverloadSet::new(name, CallKind::Command))),
                    methods: RefCell::new(FxHashMap::default()),
                    value_owned: Cell::new(false),
                });
                table
                    .classes
                    .borrow_mut()
                    .insert(name.to_string(), handler.clone());
                tracing::debug!(class = name, "registered class");
                handler
            }
        };
        Ok(Self {
            interp: interp.clone(),
            handler,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.handler.name
    }

    pub fn descriptor(&self) -> &Rc<Descriptor> {
        &self.handler.descriptor
    }

    /// Objects are owned by the values that hold them; the handle command
    /// goes away when the last one is released.
    pub fn value_owned(self) -> Self {
        self.handler.value_owned.set(true);
        self
    }

    /// Remove the constructor command. Objects can then only come from
    /// factory bindings.
    pub fn no_constructor(self) -> Self {
        *self.handler.constructors.borrow_mut() = OverloadSet::new(self.handler.name.as_str(), CallKind::Command);
        self.interp.delete_command(&self.handler.name);
        self
    }

    /// Add a constructor. Several constructors form an overload set.
    pub fn constructor<M, F>(self, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoConstructor<C, M>,
    {
        self.constructor_with(f, Policies::new())
    }

    pub fn constructor_with<M, F>(self, f: F, policies: Policies) -> Result<Self, RegistrationError>
    where
        F: IntoConstructor<C, M>,
    {
        let policies = policies.factory(self.handler.name.clone());
        let callback = Callback::new::<F::Params>(
            &self.interp,
            &self.handler.name,
            f.into_invoker(),
            policies,
            CallKind::Command,
        )?;
        self.handler.constructors.borrow_mut().push(callback);

        let set = self.handler.constructors.clone();
        self.interp.create_command(
            &self.handler.name,
            Rc::new(move |interp: &Interp, objv: &[Obj]| overload::dispatch(interp, &set, objv, None)),
        );
        Ok(self)
    }

    /// Bind a method, replacing any method of the same name.
    pub fn method<M, F>(self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoMethod<C, M>,
    {
        self.method_with(name, f, Policies::new())
    }

    pub fn method_with<M, F>(self, name: &str, f: F, policies: Policies) -> Result<Self, RegistrationError>
    where
        F: IntoMethod<C, M>,
    {
        let callback = self.method_callback(name, f, policies)?;
        self.method_entry(name).borrow_mut().replace(callback);
        Ok(self)
    }

    /// Add another signature to a method, selected by argument count.
    pub fn overload<M, F>(self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoMethod<C, M>,
    {
        let callback = self.method_callback(name, f, Policies::new())?;
        self.method_entry(name).borrow_mut().push(callback);
        Ok(self)
    }

    fn method_callback<M, F>(&self, name: &str, f: F, policies: Policies) -> Result<Callback, RegistrationError>
    where
        F: IntoMethod<C, M>,
    {
        Callback::new::<F::Params>(&self.interp, name, f.into_invoker(), policies, CallKind::Method)
    }

    fn method_entry(&self, name: &str) -> Rc<RefCell<OverloadSet>> {
        self.handler
            .methods
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(OverloadSet::new(name, CallKind::Method))))
            .clone()
    }
}
