//! Host runtime for the tclbind binding layer.
//!
//! This crate provides the pieces the marshaling layer is built on:
//!
//! - [`Obj`]: the reference-counted value cell with a cached string form
//! - [`Interp`]: command table, variables, result slot and script evaluation
//! - [`TypeRegistry`] and [`Descriptor`]: per-interpreter native type tags
//! - [`ObjectHeap`]: generational arena holding boxed native values
//! - [`Handle`]: typed access to a native value extracted from a cell

mod builtins;
mod embed;
pub mod error;
mod eval;
pub mod heap;
mod interp;
pub mod list;
mod native;
mod obj;
mod property;
pub mod registry;
mod type_hash;

pub use error::{ConversionError, RegistrationError, TclError};
pub use heap::{NativeValue, ObjectHandle, ObjectHeap, ReleaseAction};
pub use interp::{CommandProc, DeleteProc, Interp};
pub use native::{Handle, NativeRep, Ownership};
pub use obj::{Obj, parse_bool, parse_double, parse_int};
pub use property::InterpProperty;
pub use registry::{Descriptor, Flavor, NativeType, TypeRegistry};
pub use type_hash::TypeHash;
