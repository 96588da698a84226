//! Conversions between value cells and Rust types.
//!
//! [`FromObj`] reads a callable's argument from a cell; [`IntoObj`] turns a
//! callable's return value into the command result. Both are implemented for
//! the primitive types, strings, byte arrays and native handles.

use std::any::{TypeId, type_name};
use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use tclbind_core::{ConversionError, Handle, Interp, Obj, Ownership, TclError, TypeRegistry};

/// A native type a binding needs registered before it can be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRequirement {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl TypeRequirement {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

/// Convert from a value cell to a Rust type (for extracting arguments).
///
/// # Example
///
/// ```ignore
/// impl FromObj for Celsius {
///     fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
///         Ok(Celsius(obj.get_double()?))
///     }
///
///     fn label(_registry: &TypeRegistry) -> String {
///         "celsius".into()
///     }
/// }
/// ```
pub trait FromObj: Sized + 'static {
    /// A flag option takes no value: its presence means `true`.
    const IS_FLAG: bool = false;

    fn from_obj(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError>;

    /// Type name used in synthesized usage lines.
    fn label(registry: &TypeRegistry) -> String;

    /// Native types this conversion depends on.
    fn requirements(_out: &mut Vec<TypeRequirement>) {}
}

/// Convert from a Rust type to a value cell (for command results).
pub trait IntoObj {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError>;
}

// =============================================================================
// FromObj implementations for primitive types
// =============================================================================

impl FromObj for Obj {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        Ok(obj.clone())
    }

    fn label(_registry: &TypeRegistry) -> String {
        "value".to_string()
    }
}

impl FromObj for bool {
    const IS_FLAG: bool = true;

    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        obj.get_bool()
    }

    fn label(_registry: &TypeRegistry) -> String {
        "boolean".to_string()
    }
}

impl FromObj for i64 {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        obj.get_int()
    }

    fn label(_registry: &TypeRegistry) -> String {
        "int".to_string()
    }
}

macro_rules! from_obj_narrow_int {
    ($($ty:ty => $label:literal),* $(,)?) => {
        $(
            impl FromObj for $ty {
                fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
                    let value = obj.get_int()?;
                    <$ty>::try_from(value).map_err(|_| ConversionError::IntegerOverflow {
                        value,
                        target_type: stringify!($ty),
                    })
                }

                fn label(_registry: &TypeRegistry) -> String {
                    $label.to_string()
                }
            }
        )*
    };
}

from_obj_narrow_int! {
    i8 => "int",
    i16 => "int",
    i32 => "int",
    isize => "int",
    u8 => "int",
    u16 => "int",
    u32 => "int",
    u64 => "int",
    usize => "int",
}

impl FromObj for f64 {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        obj.get_double()
    }

    fn label(_registry: &TypeRegistry) -> String {
        "double".to_string()
    }
}

impl FromObj for f32 {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        let value = obj.get_double()?;
        let narrowed = value as f32;
        if value.is_finite() && !narrowed.is_finite() {
            return Err(ConversionError::FloatConversion {
                value,
                target_type: "f32",
            });
        }
        Ok(narrowed)
    }

    fn label(_registry: &TypeRegistry) -> String {
        "double".to_string()
    }
}

impl FromObj for String {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        Ok(obj.as_string())
    }

    fn label(_registry: &TypeRegistry) -> String {
        "string".to_string()
    }
}

impl FromObj for char {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        let text = obj.as_rc_str();
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConversionError::type_mismatch("character", format!("\"{text}\""))),
        }
    }

    fn label(_registry: &TypeRegistry) -> String {
        "char".to_string()
    }
}

/// Byte array argument or result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl FromObj for Bytes {
    fn from_obj(_interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        Ok(Bytes(obj.get_bytes()))
    }

    fn label(_registry: &TypeRegistry) -> String {
        "bytes".to_string()
    }
}

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

// =============================================================================
// Native values
// =============================================================================

pub(crate) fn native_label<T: 'static>(registry: &TypeRegistry) -> String {
    match registry.lookup::<T>() {
        Some(descriptor) => descriptor.name().to_string(),
        None => type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("object")
            .to_string(),
    }
}

impl<T: 'static> FromObj for Handle<T> {
    fn from_obj(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        interp.extract::<T>(obj)
    }

    fn label(registry: &TypeRegistry) -> String {
        native_label::<T>(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        out.push(TypeRequirement::of::<T>());
    }
}

/// A copy of a native argument. The callee gets its own value; changes do
/// not reach the caller's object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Val<T>(pub T);

impl<T> Val<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Val<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Val<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Clone + 'static> FromObj for Val<T> {
    fn from_obj(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        let handle = interp.extract::<T>(obj)?;
        let value = handle.try_borrow()?.clone();
        Ok(Val(value))
    }

    fn label(registry: &TypeRegistry) -> String {
        native_label::<T>(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        out.push(TypeRequirement::of::<T>());
    }
}

/// Return wrapper: a new native object owned exclusively by the result cell.
#[derive(Debug)]
pub struct New<T>(pub T);

/// Return wrapper: a new native object whose cells share one counted
/// reference.
#[derive(Debug)]
pub struct SharedNew<T>(pub T);

// =============================================================================
// IntoObj implementations
// =============================================================================

impl IntoObj for () {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::new())
    }
}

impl IntoObj for Obj {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(self)
    }
}

impl IntoObj for bool {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from_bool(self))
    }
}

macro_rules! into_obj_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoObj for $ty {
                fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
                    Ok(Obj::from_int(i64::from(self)))
                }
            }
        )*
    };
}

into_obj_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! into_obj_wide_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoObj for $ty {
                fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
                    let value = i64::try_from(self).map_err(|_| ConversionError::Failed {
                        message: format!("integer value {self} too large to represent"),
                    })?;
                    Ok(Obj::from_int(value))
                }
            }
        )*
    };
}

into_obj_wide_int!(u64, usize, isize);

impl IntoObj for f64 {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from_double(self))
    }
}

impl IntoObj for f32 {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from_double(f64::from(self)))
    }
}

impl IntoObj for String {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from(self))
    }
}

impl IntoObj for &str {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from(self))
    }
}

impl IntoObj for char {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from(self.to_string()))
    }
}

impl IntoObj for Bytes {
    fn into_obj(self, _interp: &Interp) -> Result<Obj, TclError> {
        Ok(Obj::from_bytes(self.0))
    }
}

impl<T: IntoObj> IntoObj for Vec<T> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        let items = self
            .into_iter()
            .map(|item| item.into_obj(interp))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Obj::from_list(items))
    }
}

impl<T: IntoObj> IntoObj for Option<T> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        match self {
            Some(value) => value.into_obj(interp),
            None => Ok(Obj::new()),
        }
    }
}

impl<T: IntoObj, E: Display> IntoObj for Result<T, E> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        match self {
            Ok(value) => value.into_obj(interp),
            Err(err) => Err(TclError::native(err.to_string())),
        }
    }
}

impl<T: 'static> IntoObj for Handle<T> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        Ok(interp.handle_to_obj(&self))
    }
}

impl<T: 'static> IntoObj for New<T> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        Ok(interp.new_object(self.0, Ownership::Exclusive)?)
    }
}

impl<T: 'static> IntoObj for SharedNew<T> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        Ok(interp.new_object(self.0, Ownership::Shared)?)
    }
}

impl<T: 'static> IntoObj for Val<T> {
    fn into_obj(self, interp: &Interp) -> Result<Obj, TclError> {
        New(self.0).into_obj(interp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Pt(i32, i32);

    fn interp() -> Interp {
        let interp = Interp::new();
        interp.register_copyable_as::<Pt>("Pt").unwrap();
        interp
    }

    #[test]
    fn integers_narrow_with_range_check() {
        let interp = interp();
        assert_eq!(u8::from_obj(&interp, &Obj::from("255")).unwrap(), 255);
        let err = u8::from_obj(&interp, &Obj::from("256")).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::IntegerOverflow { value: 256, target_type: "u8" }
        ));
        assert!(i32::from_obj(&interp, &Obj::from("x")).is_err());
    }

    #[test]
    fn floats() {
        let interp = interp();
        assert_eq!(f64::from_obj(&interp, &Obj::from("1.5")).unwrap(), 1.5);
        assert!(f32::from_obj(&interp, &Obj::from("1e300")).is_err());
        assert!(f32::from_obj(&interp, &Obj::from("Inf")).unwrap().is_infinite());
    }

    #[test]
    fn chars_and_bytes() {
        let interp = interp();
        assert_eq!(char::from_obj(&interp, &Obj::from("é")).unwrap(), 'é');
        assert!(char::from_obj(&interp, &Obj::from("ab")).is_err());
        let bytes = Bytes::from_obj(&interp, &Obj::from("hi")).unwrap();
        assert_eq!(&bytes[..], b"hi");
    }

    #[test]
    fn results_become_errors() {
        let interp = interp();
        let ok: Result<i32, String> = Ok(3);
        assert_eq!(ok.into_obj(&interp).unwrap().as_string(), "3");
        let err: Result<i32, String> = Err("boom".into());
        assert_eq!(err.into_obj(&interp).unwrap_err().to_string(), "boom");
    }

    #[test]
    fn vectors_become_lists() {
        let interp = interp();
        let obj = vec!["a b", "c"].into_obj(&interp).unwrap();
        assert_eq!(obj.as_string(), "{a b} c");
    }

    #[test]
    fn wide_integers_range_checked() {
        let interp = interp();
        assert!(u64::MAX.into_obj(&interp).is_err());
        assert_eq!(7usize.into_obj(&interp).unwrap().get_int().unwrap(), 7);
    }

    #[test]
    fn val_copies() {
        let interp = interp();
        let obj = New(Pt(1, 2)).into_obj(&interp).unwrap();
        let mut copy = Val::<Pt>::from_obj(&interp, &obj).unwrap();
        copy.0.0 = 5;
        assert_eq!(*interp.extract::<Pt>(&obj).unwrap().borrow(), Pt(1, 2));
    }

    #[test]
    fn labels() {
        let interp = interp();
        let registry = interp.registry();
        assert_eq!(i32::label(&registry), "int");
        assert_eq!(Handle::<Pt>::label(&registry), "Pt");
        struct Unregistered;
        assert_eq!(Handle::<Unregistered>::label(&registry), "Unregistered");
    }
}
