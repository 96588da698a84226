//! Type descriptor registry.
//!
//! Each native type that crosses into the interpreter gets exactly one
//! [`Descriptor`]: its runtime-visible name, its tag, and how values of the
//! type are stored and copied. The registry is owned by an interpreter, so two
//! interpreters may register the same Rust type under different names.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{ConversionError, RegistrationError};
use crate::heap::{NativeValue, ObjectHandle};
use crate::native::{HeapRef, Ownership, Payload};
use crate::type_hash::TypeHash;

/// Marker trait for types with a default runtime-visible name.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(NativeType)]
/// #[tcl(name = "Point")]
/// struct Point { x: i64, y: i64 }
/// ```
pub trait NativeType: 'static {
    /// The name of this type inside the interpreter.
    const NAME: &'static str;
}

/// Storage strategy for values of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Small copyable values stored directly in the cell.
    Inline,
    /// Values stored in the object arena and referenced by handle.
    Boxed,
}

pub type CloneFn = fn(&dyn Any) -> Option<NativeValue>;

fn clone_value<T: Clone + 'static>(value: &dyn Any) -> Option<NativeValue> {
    let cell = value.downcast_ref::<RefCell<T>>()?;
    let copy = cell.try_borrow().ok()?.clone();
    Some(Rc::new(RefCell::new(copy)))
}

/// Everything the binding layer knows about one native type.
pub struct Descriptor {
    name: String,
    hash: TypeHash,
    type_id: TypeId,
    rust_name: &'static str,
    flavor: Flavor,
    clone_fn: Option<CloneFn>,
}

impl Descriptor {
    /// Descriptor for a non-copyable type.
    pub fn boxed<T: 'static>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            type_id: TypeId::of::<T>(),
            rust_name: type_name::<T>(),
            flavor: Flavor::Boxed,
            clone_fn: None,
        }
    }

    /// Descriptor for a copyable type. Values no larger than two machine
    /// words are stored inline.
    pub fn copyable<T: Clone + 'static>(name: impl Into<String>) -> Self {
        let flavor = if size_of::<T>() <= 2 * size_of::<usize>() {
            Flavor::Inline
        } else {
            Flavor::Boxed
        };
        Self {
            flavor,
            clone_fn: Some(clone_value::<T>),
            ..Self::boxed::<T>(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn is_copyable(&self) -> bool {
        self.clone_fn.is_some()
    }

    /// Handle token naming an arena slot of this type.
    pub fn token(&self, handle: ObjectHandle) -> String {
        format!("{}#{}.{}", self.name, handle.index, handle.generation)
    }

    /// Recover the arena handle from a token produced by [`Descriptor::token`].
    pub fn parse_token(&self, token: &str) -> Option<ObjectHandle> {
        let rest = token.strip_prefix(self.name.as_str())?.strip_prefix('#')?;
        let (index, generation) = rest.split_once('.')?;
        Some(ObjectHandle::new(index.parse().ok()?, generation.parse().ok()?))
    }

    /// Copy a value for a new cell according to its ownership.
    pub(crate) fn duplicate(&self, payload: &Payload) -> Result<Payload, ConversionError> {
        match payload {
            Payload::Inline(value) => Ok(Payload::Inline(self.copy_value(value)?)),
            Payload::Boxed(reference) => match reference.ownership() {
                Ownership::Exclusive => {
                    let heap = reference.heap().ok_or_else(|| self.stale(reference.handle()))?;
                    let value = heap
                        .get(reference.handle())
                        .ok_or_else(|| self.stale(reference.handle()))?;
                    let copy = self.copy_value(&value)?;
                    let handle = heap.allocate(copy, self.type_id);
                    Ok(Payload::Boxed(HeapRef::new(&heap, handle, Ownership::Exclusive)))
                }
                Ownership::Shared => {
                    let heap = reference.heap().ok_or_else(|| self.stale(reference.handle()))?;
                    if !heap.add_ref(reference.handle()) {
                        return Err(self.stale(reference.handle()));
                    }
                    Ok(Payload::Boxed(HeapRef::new(
                        &heap,
                        reference.handle(),
                        Ownership::Shared,
                    )))
                }
                Ownership::Borrowed => Ok(Payload::Boxed(reference.view())),
            },
        }
    }

    fn copy_value(&self, value: &NativeValue) -> Result<NativeValue, ConversionError> {
        let clone_fn = self.clone_fn.ok_or_else(|| ConversionError::NotCopyable {
            type_name: self.name.clone(),
        })?;
        clone_fn(value.as_ref()).ok_or_else(|| ConversionError::Busy {
            type_name: self.name.clone(),
        })
    }

    /// Text form of a native value.
    pub(crate) fn stringify(&self, payload: &Payload) -> String {
        match payload {
            Payload::Boxed(reference) => self.token(reference.handle()),
            Payload::Inline(value) => format!("{}@{:p}", self.name, Rc::as_ptr(value)),
        }
    }

    pub(crate) fn stale(&self, handle: ObjectHandle) -> ConversionError {
        ConversionError::StaleHandle {
            token: self.token(handle),
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .field("rust_name", &self.rust_name)
            .field("flavor", &self.flavor)
            .field("copyable", &self.is_copyable())
            .finish()
    }
}

/// Per-interpreter table of descriptors, keyed by tag and by Rust type.
#[derive(Default)]
pub struct TypeRegistry {
    by_hash: FxHashMap<TypeHash, Rc<Descriptor>>,
    by_type: FxHashMap<TypeId, Rc<Descriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: NativeType>(&mut self) -> Result<Rc<Descriptor>, RegistrationError> {
        self.insert(Descriptor::boxed::<T>(T::NAME))
    }

    pub fn register_as<T: 'static>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<Rc<Descriptor>, RegistrationError> {
        self.insert(Descriptor::boxed::<T>(name))
    }

    pub fn register_copyable<T: NativeType + Clone>(
        &mut self,
    ) -> Result<Rc<Descriptor>, RegistrationError> {
        self.insert(Descriptor::copyable::<T>(T::NAME))
    }

    pub fn register_copyable_as<T: Clone + 'static>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<Rc<Descriptor>, RegistrationError> {
        self.insert(Descriptor::copyable::<T>(name))
    }

    /// Insert a descriptor. Registering a Rust type that is already known
    /// returns the existing descriptor unchanged.
    pub fn insert(&mut self, descriptor: Descriptor) -> Result<Rc<Descriptor>, RegistrationError> {
        if let Some(existing) = self.by_type.get(&descriptor.type_id) {
            if existing.name != descriptor.name {
                tracing::debug!(
                    rust_type = descriptor.rust_name,
                    kept = %existing.name,
                    ignored = %descriptor.name,
                    "type already registered under another name"
                );
            }
            return Ok(existing.clone());
        }

        if let Some(existing) = self.by_hash.get(&descriptor.hash) {
            return Err(RegistrationError::NameTaken {
                name: descriptor.name,
                existing: existing.rust_name.to_string(),
            });
        }

        tracing::debug!(
            name = %descriptor.name,
            rust_type = descriptor.rust_name,
            flavor = ?descriptor.flavor,
            "registered native type"
        );
        let descriptor = Rc::new(descriptor);
        self.by_hash.insert(descriptor.hash, descriptor.clone());
        self.by_type.insert(descriptor.type_id, descriptor.clone());
        Ok(descriptor)
    }

    pub fn lookup<T: 'static>(&self) -> Option<Rc<Descriptor>> {
        self.lookup_type_id(TypeId::of::<T>())
    }

    pub fn lookup_type_id(&self, type_id: TypeId) -> Option<Rc<Descriptor>> {
        self.by_type.get(&type_id).cloned()
    }

    pub fn lookup_hash(&self, hash: TypeHash) -> Option<Rc<Descriptor>> {
        self.by_hash.get(&hash).cloned()
    }

    pub fn lookup_name(&self, name: &str) -> Option<Rc<Descriptor>> {
        self.lookup_hash(TypeHash::from_name(name))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_type.values().map(|d| d.name()).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry").field("types", &self.names()).finish()
    }
}
