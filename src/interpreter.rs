//! The registration front end.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tclbind_core::{CommandProc, Interp, NativeType, Obj, RegistrationError, TclError};

use crate::callable::IntoCommand;
use crate::class_builder::ClassBuilder;
use crate::convert::{FromObj, IntoObj, New};
use crate::dispatch::{CallKind, Callback};
use crate::overload::{self, OverloadSet};
use crate::policies::Policies;

/// An overload set and the dispatcher installed for it.
struct Binding {
    set: Rc<RefCell<OverloadSet>>,
    proc_: CommandProc,
}

/// Free-function overload sets by the name they were installed under.
#[derive(Default)]
struct FunctionTable {
    sets: RefCell<FxHashMap<String, Binding>>,
}

/// An interpreter with native binding support.
///
/// Dereferences to [`Interp`] for evaluation, variables and the type
/// registry.
///
/// # Example
///
/// ```ignore
/// let interp = Interpreter::new();
/// interp.def("add", |a: i64, b: i64| a + b)?;
/// assert_eq!(interp.eval_as::<i64>("add 2 3")?, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    interp: Interp,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            interp: Interp::new(),
        }
    }

    /// Wrap an existing interpreter handle.
    pub fn from_interp(interp: Interp) -> Self {
        Self { interp }
    }

    pub fn interp(&self) -> &Interp {
        &self.interp
    }

    /// Bind `f` as the command `name`, replacing any earlier binding.
    pub fn def<M, F>(&self, name: &str, f: F) -> Result<(), RegistrationError>
    where
        F: IntoCommand<M>,
    {
        self.def_with(name, f, Policies::new())
    }

    pub fn def_with<M, F>(&self, name: &str, f: F, policies: Policies) -> Result<(), RegistrationError>
    where
        F: IntoCommand<M>,
    {
        let callback = self.callback(name, f, policies)?;
        let mut set = OverloadSet::new(name, CallKind::Command);
        set.push(callback);
        self.install_set(name, set);
        Ok(())
    }

    /// Add a signature to the command `name`, selected by argument count.
    pub fn def_overload<M, F>(&self, name: &str, f: F) -> Result<(), RegistrationError>
    where
        F: IntoCommand<M>,
    {
        self.def_overload_with(name, f, Policies::new())
    }

    pub fn def_overload_with<M, F>(
        &self,
        name: &str,
        f: F,
        policies: Policies,
    ) -> Result<(), RegistrationError>
    where
        F: IntoCommand<M>,
    {
        let callback = self.callback(name, f, policies)?;
        match self.installed_set(name) {
            Some(set) => set.borrow_mut().push(callback),
            None => {
                let mut set = OverloadSet::new(name, CallKind::Command);
                set.push(callback);
                self.install_set(name, set);
            }
        }
        Ok(())
    }

    fn callback<M, F>(&self, name: &str, f: F, policies: Policies) -> Result<Callback, RegistrationError>
    where
        F: IntoCommand<M>,
    {
        Callback::new::<F::Params>(&self.interp, name, f.into_invoker(), policies, CallKind::Command)
    }

    /// The overload set dispatched by the command currently named `name`,
    /// if that command is one of ours and was installed under that name.
    fn installed_set(&self, name: &str) -> Option<Rc<RefCell<OverloadSet>>> {
        let current = self.interp.command_proc(name)?;
        let table = self.interp.assoc_data::<FunctionTable>();
        let sets = table.sets.borrow();
        let binding = sets.get(name)?;
        Rc::ptr_eq(&binding.proc_, &current).then(|| binding.set.clone())
    }

    /// Bind `name` to a dispatcher over `set`, replacing whatever command
    /// held the name.
    fn install_set(&self, name: &str, set: OverloadSet) {
        let set = Rc::new(RefCell::new(set));
        let dispatch_set = set.clone();
        let proc_: CommandProc = Rc::new(move |interp: &Interp, objv: &[Obj]| {
            overload::dispatch(interp, &dispatch_set, objv, None)
        });

        let key = name.to_string();
        let installed = proc_.clone();
        self.interp.create_command_with_delete(
            name,
            proc_.clone(),
            Box::new(move |interp: &Interp| {
                let table = interp.assoc_data::<FunctionTable>();
                let mut sets = table.sets.borrow_mut();
                if sets
                    .get(&key)
                    .is_some_and(|binding| Rc::ptr_eq(&binding.proc_, &installed))
                {
                    sets.remove(&key);
                }
            }),
        );

        let table = self.interp.assoc_data::<FunctionTable>();
        table
            .sets
            .borrow_mut()
            .insert(name.to_string(), Binding { set, proc_ });
    }

    /// Start registering the native class `C` under `name`.
    pub fn class<C: 'static>(&self, name: &str) -> Result<ClassBuilder<C>, RegistrationError> {
        ClassBuilder::new(&self.interp, name)
    }

    /// Like [`Interpreter::class`], named by [`NativeType::NAME`].
    pub fn native_class<C: NativeType>(&self) -> Result<ClassBuilder<C>, RegistrationError> {
        ClassBuilder::new(&self.interp, C::NAME)
    }

    /// Evaluate a script and convert its result.
    pub fn eval_as<T: FromObj>(&self, script: &str) -> Result<T, TclError> {
        let result = self.interp.eval(script)?;
        Ok(<T as FromObj>::from_obj(&self.interp, &result)?)
    }

    /// A new cell exclusively owning `value`.
    pub fn make_object<T: 'static>(&self, value: T) -> Result<Obj, TclError> {
        New(value).into_obj(&self.interp)
    }
}

impl Deref for Interpreter {
    type Target = Interp;

    fn deref(&self) -> &Interp {
        &self.interp
    }
}

impl From<Interp> for Interpreter {
    fn from(interp: Interp) -> Self {
        Self::from_interp(interp)
    }
}
