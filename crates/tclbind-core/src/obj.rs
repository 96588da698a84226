//! The interpreter's value cell.
//!
//! An [`Obj`] is a reference-counted cell carrying a cached string form and
//! an optional internal representation. Either may be absent but never both:
//! the string is regenerated from the representation on demand, and
//! representations are parsed from the string on demand.
//!
//! Caching a representation derived from the string never changes the value,
//! so it is allowed on shared cells. Anything that changes the value requires
//! an unshared cell; callers holding a shared cell call [`Obj::duplicate`]
//! first.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ConversionError;
use crate::list;
use crate::native::NativeRep;
use crate::type_hash::TypeHash;

pub(crate) enum Rep {
    None,
    Int(i64),
    Double(f64),
    Boolean(bool),
    List(Vec<Obj>),
    Bytes(Vec<u8>),
    Native(NativeRep),
}

struct ObjCell {
    string: Option<Rc<str>>,
    rep: Rep,
}

/// Reference-counted value cell.
///
/// `Clone` shares the cell; it does not copy the value.
#[derive(Clone)]
pub struct Obj(Rc<RefCell<ObjCell>>);

impl Obj {
    /// A new empty string value.
    pub fn new() -> Self {
        Obj::from_parts(Some(Rc::from("")), Rep::None)
    }

    fn from_parts(string: Option<Rc<str>>, rep: Rep) -> Self {
        Obj(Rc::new(RefCell::new(ObjCell { string, rep })))
    }

    pub fn from_int(value: i64) -> Self {
        Obj::from_parts(None, Rep::Int(value))
    }

    pub fn from_double(value: f64) -> Self {
        Obj::from_parts(None, Rep::Double(value))
    }

    pub fn from_bool(value: bool) -> Self {
        Obj::from_parts(None, Rep::Boolean(value))
    }

    pub fn from_list(elements: Vec<Obj>) -> Self {
        Obj::from_parts(None, Rep::List(elements))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Obj::from_parts(None, Rep::Bytes(bytes))
    }

    pub(crate) fn from_native(rep: NativeRep) -> Self {
        Obj::from_parts(None, Rep::Native(rep))
    }

    /// True when more than one holder can see this cell.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.0) > 1
    }

    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A new unshared cell holding the same value.
    ///
    /// List elements are shared with the original. Native values are copied
    /// according to their ownership.
    pub fn duplicate(&self) -> Result<Obj, ConversionError> {
        let cell = self.0.borrow();
        let rep = match &cell.rep {
            Rep::None => Rep::None,
            Rep::Int(v) => Rep::Int(*v),
            Rep::Double(v) => Rep::Double(*v),
            Rep::Boolean(v) => Rep::Boolean(*v),
            Rep::List(items) => Rep::List(items.clone()),
            Rep::Bytes(bytes) => Rep::Bytes(bytes.clone()),
            Rep::Native(native) => Rep::Native(native.duplicate()?),
        };
        // a copied native value may live in a different slot
        let string = match rep {
            Rep::Native(_) => None,
            _ => cell.string.clone(),
        };
        Ok(Obj::from_parts(string, rep))
    }

    /// The string form, generated and cached if necessary.
    pub fn as_string(&self) -> String {
        self.as_rc_str().to_string()
    }

    pub fn as_rc_str(&self) -> Rc<str> {
        if let Some(s) = &self.0.borrow().string {
            return s.clone();
        }
        let generated: Rc<str> = Rc::from(self.0.borrow().rep.to_text());
        self.0.borrow_mut().string = Some(generated.clone());
        generated
    }

    /// Name of the current internal representation.
    pub fn type_name(&self) -> String {
        match &self.0.borrow().rep {
            Rep::None => "string".to_string(),
            Rep::Int(_) => "int".to_string(),
            Rep::Double(_) => "double".to_string(),
            Rep::Boolean(_) => "boolean".to_string(),
            Rep::List(_) => "list".to_string(),
            Rep::Bytes(_) => "bytearray".to_string(),
            Rep::Native(native) => native.descriptor().name().to_string(),
        }
    }

    /// Install a representation derived from the string form. Existing
    /// representations are kept.
    fn cache_rep(&self, rep: Rep) {
        let mut cell = self.0.borrow_mut();
        if matches!(cell.rep, Rep::None) && cell.string.is_some() {
            cell.rep = rep;
        }
    }

    fn check_unshared(&self) -> Result<(), ConversionError> {
        if self.is_shared() {
            return Err(ConversionError::SharedObject);
        }
        Ok(())
    }

    fn replace(&self, string: Option<Rc<str>>, rep: Rep) -> Result<(), ConversionError> {
        self.check_unshared()?;
        let old = {
            let mut cell = self.0.borrow_mut();
            cell.string = string;
            std::mem::replace(&mut cell.rep, rep)
        };
        // a released native value may run arbitrary destructors
        drop(old);
        Ok(())
    }

    pub fn set_string(&self, value: &str) -> Result<(), ConversionError> {
        self.replace(Some(Rc::from(value)), Rep::None)
    }

    pub fn set_int(&self, value: i64) -> Result<(), ConversionError> {
        self.replace(None, Rep::Int(value))
    }

    pub fn set_list(&self, elements: Vec<Obj>) -> Result<(), ConversionError> {
        self.replace(None, Rep::List(elements))
    }

    pub(crate) fn set_native(&self, rep: NativeRep) -> Result<(), ConversionError> {
        self.replace(None, Rep::Native(rep))
    }

    /// Attach a native view to a cell whose string already names it.
    pub(crate) fn cache_native(&self, rep: NativeRep) {
        self.cache_rep(Rep::Native(rep))
    }

    pub fn is_native(&self) -> bool {
        matches!(self.0.borrow().rep, Rep::Native(_))
    }

    pub fn native_tag(&self) -> Option<TypeHash> {
        match &self.0.borrow().rep {
            Rep::Native(native) => Some(native.descriptor().hash()),
            _ => None,
        }
    }

    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&NativeRep) -> R) -> Option<R> {
        match &self.0.borrow().rep {
            Rep::Native(native) => Some(f(native)),
            _ => None,
        }
    }

    pub fn is_list_rep(&self) -> bool {
        matches!(self.0.borrow().rep, Rep::List(_))
    }

    // =========================================================================
    // Primitive readers
    // =========================================================================

    pub fn get_int(&self) -> Result<i64, ConversionError> {
        if let Rep::Int(v) = self.0.borrow().rep {
            return Ok(v);
        }
        let text = self.as_rc_str();
        let value = parse_int(&text).ok_or_else(|| ConversionError::ExpectedInteger {
            got: text.to_string(),
        })?;
        self.cache_rep(Rep::Int(value));
        Ok(value)
    }

    pub fn get_double(&self) -> Result<f64, ConversionError> {
        match self.0.borrow().rep {
            Rep::Double(v) => return Ok(v),
            Rep::Int(v) => return Ok(v as f64),
            _ => {}
        }
        let text = self.as_rc_str();
        let value = parse_double(&text).ok_or_else(|| ConversionError::ExpectedDouble {
            got: text.to_string(),
        })?;
        self.cache_rep(Rep::Double(value));
        Ok(value)
    }

    pub fn get_bool(&self) -> Result<bool, ConversionError> {
        match self.0.borrow().rep {
            Rep::Boolean(v) => return Ok(v),
            Rep::Int(v) => return Ok(v != 0),
            Rep::Double(v) => return Ok(v != 0.0),
            _ => {}
        }
        let text = self.as_rc_str();
        let value = parse_bool(&text).ok_or_else(|| ConversionError::ExpectedBoolean {
            got: text.to_string(),
        })?;
        self.cache_rep(Rep::Boolean(value));
        Ok(value)
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        if let Rep::Bytes(bytes) = &self.0.borrow().rep {
            return bytes.clone();
        }
        self.as_rc_str().as_bytes().to_vec()
    }

    // =========================================================================
    // List access
    // =========================================================================

    /// The cell's value as list elements. A native value is a one-element
    /// list containing itself.
    pub fn list_elements(&self) -> Result<Vec<Obj>, ConversionError> {
        match &self.0.borrow().rep {
            Rep::List(items) => return Ok(items.clone()),
            Rep::Native(_) => return Ok(vec![self.clone()]),
            _ => {}
        }
        let items: Vec<Obj> = list::parse(&self.as_rc_str())?
            .into_iter()
            .map(Obj::from)
            .collect();
        self.cache_rep(Rep::List(items.clone()));
        Ok(items)
    }

    pub fn list_len(&self) -> Result<usize, ConversionError> {
        match &self.0.borrow().rep {
            Rep::List(items) => return Ok(items.len()),
            Rep::Native(_) => return Ok(1),
            _ => {}
        }
        Ok(self.list_elements()?.len())
    }

    pub fn list_index(&self, index: usize) -> Result<Option<Obj>, ConversionError> {
        if let Rep::List(items) = &self.0.borrow().rep {
            return Ok(items.get(index).cloned());
        }
        Ok(self.list_elements()?.into_iter().nth(index))
    }

    /// Append an element in place. The cell must be unshared.
    pub fn list_append(&self, element: Obj) -> Result<(), ConversionError> {
        self.check_unshared()?;
        if !self.is_list_rep() {
            let items = self.detach_elements()?;
            let mut cell = self.0.borrow_mut();
            cell.rep = Rep::List(items);
        }
        let mut cell = self.0.borrow_mut();
        if let Rep::List(items) = &mut cell.rep {
            items.push(element);
        }
        cell.string = None;
        Ok(())
    }

    /// Current elements, moving a native value out into its own cell.
    fn detach_elements(&self) -> Result<Vec<Obj>, ConversionError> {
        if self.is_native() {
            let mut cell = self.0.borrow_mut();
            let string = cell.string.take();
            let rep = std::mem::replace(&mut cell.rep, Rep::None);
            return Ok(vec![Obj::from_parts(string, rep)]);
        }
        let text = self.as_rc_str();
        Ok(list::parse(&text)?.into_iter().map(Obj::from).collect())
    }
}

impl Rep {
    fn to_text(&self) -> String {
        match self {
            Rep::None => String::new(),
            Rep::Int(v) => v.to_string(),
            Rep::Double(v) => format_double(*v),
            Rep::Boolean(true) => "1".to_string(),
            Rep::Boolean(false) => "0".to_string(),
            Rep::List(items) => {
                let strings: Vec<Rc<str>> = items.iter().map(Obj::as_rc_str).collect();
                list::format(&strings)
            }
            Rep::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Rep::Native(native) => native.to_text(),
        }
    }
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Inf" } else { "-Inf" };
        text.to_string()
    } else {
        format!("{value:?}")
    }
}

/// Parse an integer in decimal or with a `0x`, `0o` or `0b` prefix.
pub fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.as_bytes().first()? {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }

    let lower = digits.to_ascii_lowercase();
    let unsigned = |body: &str| !body.is_empty() && !body.starts_with(['+', '-']);
    let magnitude = if let Some(hex) = lower.strip_prefix("0x") {
        if !unsigned(hex) {
            return None;
        }
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        if !unsigned(oct) {
            return None;
        }
        i128::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        if !unsigned(bin) {
            return None;
        }
        i128::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<i128>().ok()?
    };

    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

pub fn parse_double(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(v) = parse_int(trimmed) {
        return Some(v as f64);
    }
    trimmed.parse::<f64>().ok()
}

pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => parse_double(other).map(|v| v != 0.0),
    }
}

impl Default for Obj {
    fn default() -> Self {
        Obj::new()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Obj")
            .field(&self.as_rc_str())
            .field(&self.type_name())
            .finish()
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_rc_str())
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.as_rc_str() == other.as_rc_str()
    }
}

impl From<&str> for Obj {
    fn from(value: &str) -> Self {
        Obj::from_parts(Some(Rc::from(value)), Rep::None)
    }
}

impl From<String> for Obj {
    fn from(value: String) -> Self {
        Obj::from_parts(Some(Rc::from(value)), Rep::None)
    }
}

impl From<i64> for Obj {
    fn from(value: i64) -> Self {
        Obj::from_int(value)
    }
}

impl From<f64> for Obj {
    fn from(value: f64) -> Self {
        Obj::from_double(value)
    }
}

impl From<bool> for Obj {
    fn from(value: bool) -> Self {
        Obj::from_bool(value)
    }
}

impl From<Vec<Obj>> for Obj {
    fn from(value: Vec<Obj>) -> Self {
        Obj::from_list(value)
    }
}
