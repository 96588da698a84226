//! The interpreter handle.
//!
//! [`Interp`] is the host side of the binding layer: a command table, a
//! variable table, a result slot, the object arena and the type registry.
//! Cloning an `Interp` is cheap and yields another handle to the same
//! interpreter.

use std::any::{Any, TypeId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::builtins;
use crate::error::{RegistrationError, TclError};
use crate::heap::ObjectHeap;
use crate::obj::Obj;
use crate::property::InterpProperty;
use crate::registry::{Descriptor, NativeType, TypeRegistry};

/// A command implementation. Receives the full word vector, command name
/// included, and returns the command's result.
pub type CommandProc = Rc<dyn Fn(&Interp, &[Obj]) -> Result<Obj, TclError>>;

/// Run once when a command is removed from the table.
pub type DeleteProc = Box<dyn FnOnce(&Interp)>;

struct Command {
    proc_: CommandProc,
    on_delete: Option<DeleteProc>,
}

struct InterpInner {
    commands: RefCell<FxHashMap<String, Command>>,
    vars: RefCell<FxHashMap<String, Obj>>,
    result: RefCell<Obj>,
    heap: ObjectHeap,
    registry: RefCell<TypeRegistry>,
    properties: RefCell<FxHashMap<InterpProperty, usize>>,
    assoc: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
    depth: Cell<usize>,
}

#[derive(Clone)]
pub struct Interp {
    inner: Rc<InterpInner>,
}

impl Interp {
    /// A new interpreter with the builtin commands installed.
    pub fn new() -> Self {
        let interp = Interp {
            inner: Rc::new(InterpInner {
                commands: RefCell::new(FxHashMap::default()),
                vars: RefCell::new(FxHashMap::default()),
                result: RefCell::new(Obj::new()),
                heap: ObjectHeap::new(),
                registry: RefCell::new(TypeRegistry::new()),
                properties: RefCell::new(FxHashMap::default()),
                assoc: RefCell::new(FxHashMap::default()),
                depth: Cell::new(0),
            }),
        };
        builtins::install(&interp);
        interp
    }

    pub fn ptr_eq(&self, other: &Interp) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Bind `name` to a handler, replacing any existing command.
    pub fn create_command(&self, name: &str, proc_: CommandProc) {
        self.install_command(name, proc_, None);
    }

    /// Bind `name` to a handler with a hook run when the command is deleted.
    pub fn create_command_with_delete(&self, name: &str, proc_: CommandProc, on_delete: DeleteProc) {
        self.install_command(name, proc_, Some(on_delete));
    }

    fn install_command(&self, name: &str, proc_: CommandProc, on_delete: Option<DeleteProc>) {
        tracing::debug!(command = name, "create command");
        let previous = self
            .inner
            .commands
            .borrow_mut()
            .insert(name.to_string(), Command { proc_, on_delete });
        if let Some(previous) = previous
            && let Some(hook) = previous.on_delete
        {
            hook(self);
        }
    }

    /// Remove a command, running its delete hook. Returns false if no such
    /// command exists.
    pub fn delete_command(&self, name: &str) -> bool {
        let removed = self.inner.commands.borrow_mut().remove(name);
        match removed {
            Some(command) => {
                tracing::debug!(command = name, "delete command");
                if let Some(hook) = command.on_delete {
                    hook(self);
                }
                true
            }
            None => false,
        }
    }

    /// The handler currently bound to `name`.
    pub fn command_proc(&self, name: &str) -> Option<CommandProc> {
        self.inner
            .commands
            .borrow()
            .get(name)
            .map(|command| command.proc_.clone())
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.inner.commands.borrow().contains_key(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.commands.borrow().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Move a command to a new name. An empty new name deletes it.
    pub fn rename_command(&self, old: &str, new: &str) -> Result<(), TclError> {
        if new.is_empty() {
            if self.delete_command(old) {
                return Ok(());
            }
            return Err(TclError::script(format!(
                "can't delete \"{old}\": command doesn't exist"
            )));
        }

        let mut commands = self.inner.commands.borrow_mut();
        if commands.contains_key(new) {
            return Err(TclError::script(format!(
                "can't rename to \"{new}\": command already exists"
            )));
        }
        let command = commands.remove(old).ok_or_else(|| {
            TclError::script(format!("can't rename \"{old}\": command doesn't exist"))
        })?;
        commands.insert(new.to_string(), command);
        Ok(())
    }

    /// Run one command given its full word vector. The outcome is also
    /// stored in the result slot.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke(&self, objv: &[Obj]) -> Result<Obj, TclError> {
        let Some(first) = objv.first() else {
            return Ok(Obj::new());
        };
        let name = first.as_rc_str();
        let proc_ = self
            .inner
            .commands
            .borrow()
            .get(&*name)
            .map(|command| command.proc_.clone());
        let Some(proc_) = proc_ else {
            let err = TclError::NoSuchCommand {
                name: name.to_string(),
            };
            self.set_result(Obj::from(err.to_string()));
            return Err(err);
        };

        tracing::trace!(command = %name, argc = objv.len() - 1, "invoke");
        let outcome = proc_(self, objv);
        self.retract_released_commands();

        match &outcome {
            Ok(result) => self.set_result(result.clone()),
            Err(err) => self.set_result(Obj::from(err.to_string())),
        }
        outcome
    }

    /// Delete commands whose backing objects were released.
    pub fn retract_released_commands(&self) {
        loop {
            let retired = self.inner.heap.take_retired();
            if retired.is_empty() {
                break;
            }
            for name in retired {
                tracing::debug!(command = %name, "retracting command of released object");
                self.delete_command(&name);
            }
        }
    }

    // =========================================================================
    // Variables and result
    // =========================================================================

    pub fn set_var(&self, name: &str, value: Obj) -> Obj {
        let previous = self
            .inner
            .vars
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        drop(previous);
        value
    }

    pub fn get_var(&self, name: &str) -> Result<Obj, TclError> {
        self.inner
            .vars
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| TclError::NoSuchVariable {
                name: name.to_string(),
            })
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.inner.vars.borrow().contains_key(name)
    }

    pub fn unset_var(&self, name: &str) -> Result<(), TclError> {
        let removed = self.inner.vars.borrow_mut().remove(name);
        match removed {
            Some(value) => {
                drop(value);
                Ok(())
            }
            None => Err(TclError::script(format!(
                "can't unset \"{name}\": no such variable"
            ))),
        }
    }

    /// Remove a variable and hand back its value, leaving the caller as the
    /// only holder when nothing else references it.
    pub(crate) fn take_var(&self, name: &str) -> Option<Obj> {
        self.inner.vars.borrow_mut().remove(name)
    }

    pub fn result(&self) -> Obj {
        self.inner.result.borrow().clone()
    }

    pub fn set_result(&self, value: Obj) {
        let previous = std::mem::replace(&mut *self.inner.result.borrow_mut(), value);
        drop(previous);
    }

    pub fn reset_result(&self) {
        self.set_result(Obj::new());
    }

    // =========================================================================
    // Registry, heap, properties
    // =========================================================================

    pub fn heap(&self) -> &ObjectHeap {
        &self.inner.heap
    }

    pub fn registry(&self) -> Ref<'_, TypeRegistry> {
        self.inner.registry.borrow()
    }

    pub fn registry_mut(&self) -> RefMut<'_, TypeRegistry> {
        self.inner.registry.borrow_mut()
    }

    pub fn register<T: NativeType>(&self) -> Result<Rc<Descriptor>, RegistrationError> {
        self.registry_mut().register::<T>()
    }

    pub fn register_as<T: 'static>(&self, name: &str) -> Result<Rc<Descriptor>, RegistrationError> {
        self.registry_mut().register_as::<T>(name)
    }

    pub fn register_copyable<T: NativeType + Clone>(
        &self,
    ) -> Result<Rc<Descriptor>, RegistrationError> {
        self.registry_mut().register_copyable::<T>()
    }

    pub fn register_copyable_as<T: Clone + 'static>(
        &self,
        name: &str,
    ) -> Result<Rc<Descriptor>, RegistrationError> {
        self.registry_mut().register_copyable_as::<T>(name)
    }

    pub fn lookup<T: 'static>(&self) -> Option<Rc<Descriptor>> {
        self.registry().lookup::<T>()
    }

    pub fn property(&self, property: InterpProperty) -> usize {
        self.inner
            .properties
            .borrow()
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    pub fn set_property(&self, property: InterpProperty, value: usize) {
        tracing::debug!(property = property.name(), value, "set property");
        self.inner.properties.borrow_mut().insert(property, value);
    }

    pub fn flag(&self, property: InterpProperty) -> bool {
        self.property(property) != 0
    }

    /// Per-interpreter extension state, created on first use.
    pub fn assoc_data<T: Default + 'static>(&self) -> Rc<T> {
        let existing = self.inner.assoc.borrow().get(&TypeId::of::<T>()).cloned();
        if let Some(data) = existing
            && let Ok(typed) = data.downcast::<T>()
        {
            return typed;
        }
        let data = Rc::new(T::default());
        self.inner
            .assoc
            .borrow_mut()
            .insert(TypeId::of::<T>(), data.clone());
        data
    }

    // =========================================================================
    // Evaluation depth
    // =========================================================================

    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>, TclError> {
        let depth = self.inner.depth.get();
        if depth >= self.property(InterpProperty::MaxNestingDepth) {
            return Err(TclError::NestingTooDeep);
        }
        self.inner.depth.set(depth + 1);
        Ok(DepthGuard { interp: self })
    }

    pub fn depth(&self) -> usize {
        self.inner.depth.get()
    }
}

pub(crate) struct DepthGuard<'a> {
    interp: &'a Interp,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let depth = self.interp.inner.depth.get();
        self.interp.inner.depth.set(depth.saturating_sub(1));
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

impl fmt::Debug for Interp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interp")
            .field("commands", &self.inner.commands.borrow().len())
            .field("vars", &self.inner.vars.borrow().len())
            .field("heap", &self.inner.heap)
            .field("registry", &*self.inner.registry.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> CommandProc {
        Rc::new(|_, objv| Ok(Obj::from_list(objv[1..].to_vec())))
    }

    #[test]
    fn create_invoke_delete() {
        let interp = Interp::new();
        interp.create_command("echo", echo());
        let out = interp
            .invoke(&[Obj::from("echo"), Obj::from("a"), Obj::from("b c")])
            .unwrap();
        assert_eq!(out.as_string(), "a {b c}");
        assert_eq!(interp.result().as_string(), "a {b c}");
        assert!(interp.delete_command("echo"));
        let err = interp.invoke(&[Obj::from("echo")]).unwrap_err();
        assert_eq!(err.to_string(), "no such command \"echo\"");
    }

    #[test]
    fn delete_hook_runs_once() {
        let interp = Interp::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        interp.create_command_with_delete(
            "x",
            echo(),
            Box::new(move |_| counter.set(counter.get() + 1)),
        );
        interp.delete_command("x");
        interp.delete_command("x");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn rename() {
        let interp = Interp::new();
        interp.create_command("a", echo());
        interp.rename_command("a", "b").unwrap();
        assert!(!interp.has_command("a"));
        assert!(interp.has_command("b"));
        assert!(interp.rename_command("a", "c").is_err());
        interp.rename_command("b", "").unwrap();
        assert!(!interp.has_command("b"));
    }

    #[test]
    fn variables() {
        let interp = Interp::new();
        interp.set_var("x", Obj::from_int(3));
        assert_eq!(interp.get_var("x").unwrap().get_int().unwrap(), 3);
        interp.unset_var("x").unwrap();
        let err = interp.get_var("x").unwrap_err();
        assert_eq!(err.to_string(), "can't read \"x\": no such variable");
    }

    #[test]
    fn properties_default_and_override() {
        let interp = Interp::new();
        assert_eq!(interp.property(InterpProperty::MaxNestingDepth), 1000);
        interp.set_property(InterpProperty::MaxNestingDepth, 3);
        assert_eq!(interp.property(InterpProperty::MaxNestingDepth), 3);
    }

    #[test]
    fn assoc_data_is_shared() {
        #[derive(Default)]
        struct Counter(Cell<u32>);

        let interp = Interp::new();
        interp.assoc_data::<Counter>().0.set(5);
        assert_eq!(interp.clone().assoc_data::<Counter>().0.get(), 5);
    }
}
