//! Native bindings for a Tcl-style interpreter.
//!
//! Rust functions, closures and types are exposed as interpreter commands.
//! Argument words are converted to the callable's parameter types, results
//! are converted back, and native objects live inside value cells with
//! exclusive, shared or borrowed ownership.
//!
//! ```ignore
//! use tclbind::prelude::*;
//!
//! let interp = Interpreter::new();
//! interp.def("add", |a: i64, b: i64| a + b)?;
//! interp.def_with(
//!     "greet",
//!     |loud: Getopt<bool>, name: String| {
//!         let text = format!("hello {name}");
//!         if loud.unwrap_or(false) { text.to_uppercase() } else { text }
//!     },
//!     options("loud"),
//! )?;
//! interp.eval("greet -loud world")?;
//! ```

extern crate self as tclbind;

mod any_of;
mod callable;
mod class_builder;
mod convert;
mod dispatch;
pub mod error;
mod getopt;
mod interpreter;
mod overload;
mod param;
mod policies;
mod views;

pub use any_of::{AnyOf, Candidate, CandidateSet, Visit};
pub use callable::{IntoCommand, IntoConstructor, IntoMethod, Invoker};
pub use class_builder::ClassBuilder;
pub use convert::{Bytes, FromObj, IntoObj, New, SharedNew, TypeRequirement, Val};
pub use dispatch::{CallKind, Callback};
pub use error::NativeError;
pub use getopt::{Getopt, OptionSpec};
pub use interpreter::Interpreter;
pub use overload::OverloadSet;
pub use param::{Frame, Opt, OptionValue, Param, ParamKind, ParamList, Signature, SignatureFlags};
pub use policies::{Policies, factory, options, sink, usage};
pub use views::{List, ListIter, Rest};

pub use tclbind_core::{
    ConversionError, Descriptor, Flavor, Handle, Interp, InterpProperty, NativeType, Obj,
    ObjectHandle, ObjectHeap, Ownership, RegistrationError, ReleaseAction, TclError, TypeHash,
    TypeRegistry, list,
};
pub use tclbind_macros::NativeType;

pub mod prelude {
    pub use crate::{
        AnyOf, Bytes, ClassBuilder, ConversionError, FromObj, Getopt, Handle, Interp,
        InterpProperty, Interpreter, IntoObj, List, NativeError, NativeType, New, Obj, Opt,
        Ownership, Policies, RegistrationError, Rest, SharedNew, TclError, Val, factory, options,
        sink, usage,
    };
}
