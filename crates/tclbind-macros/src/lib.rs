//! tclbind proc macros
//!
//! - `#[derive(NativeType)]` - give a type its interpreter-visible name
//!
//! ```ignore
//! use tclbind::NativeType;
//!
//! #[derive(NativeType)]
//! #[tcl(name = "Point")]
//! pub struct Point {
//!     x: i64,
//!     y: i64,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_native;

/// Derive the `NativeType` trait for a type.
///
/// # Attributes
///
/// - `#[tcl(name = "...")]` - Override the interpreter-visible type name
///   (default: the Rust type name)
#[proc_macro_derive(NativeType, attributes(tcl))]
pub fn derive_native_type(input: TokenStream) -> TokenStream {
    derive_native::derive_native_impl(input)
}
