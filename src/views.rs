//! Sequence views over argument words.
//!
//! [`Rest`] collects all trailing positional words; [`List`] reads a single
//! list-valued word. Both convert elements on access rather than up front.

use std::fmt;
use std::marker::PhantomData;

use tclbind_core::{ConversionError, Interp, Obj, TclError, TypeRegistry};

use crate::convert::{FromObj, TypeRequirement};
use crate::param::{Frame, Param, ParamKind};

/// All remaining positional arguments, converted to `T` on access.
pub struct Rest<T> {
    interp: Interp,
    items: Vec<Obj>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromObj> Rest<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Result<T, ConversionError>> {
        let obj = self.items.get(index)?;
        Some(<T as FromObj>::from_obj(&self.interp, obj))
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<T, ConversionError>> + '_ {
        self.items
            .iter()
            .map(|obj| <T as FromObj>::from_obj(&self.interp, obj))
    }

    /// Convert every element, failing on the first bad one.
    pub fn to_vec(&self) -> Result<Vec<T>, ConversionError> {
        self.iter().collect()
    }

    pub fn objs(&self) -> &[Obj] {
        &self.items
    }
}

impl<T> fmt::Debug for Rest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: FromObj> Param for Rest<T> {
    const KIND: ParamKind = ParamKind::Rest;

    fn label(registry: &TypeRegistry) -> String {
        <T as FromObj>::label(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        <T as FromObj>::requirements(out);
    }

    fn bind(frame: &mut Frame<'_>) -> Result<Self, TclError> {
        Ok(Rest {
            interp: frame.interp().clone(),
            items: frame.take_remaining(),
            _marker: PhantomData,
        })
    }
}

/// A list-valued argument viewed as a sequence of `T`.
pub struct List<T> {
    interp: Interp,
    obj: Obj,
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> List<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The underlying list cell.
    pub fn obj(&self) -> &Obj {
        &self.obj
    }
}

impl<T: FromObj> List<T> {
    pub fn get(&self, index: usize) -> Option<Result<T, ConversionError>> {
        match self.obj.list_index(index) {
            Ok(Some(element)) => Some(<T as FromObj>::from_obj(&self.interp, &element)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }

    /// A fresh iterator starting at the first element.
    pub fn iter(&self) -> ListIter<'_, T> {
        ListIter {
            list: self,
            index: 0,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<T>, ConversionError> {
        self.iter().collect()
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("obj", &self.obj)
            .field("len", &self.len)
            .finish()
    }
}

impl<T: FromObj> FromObj for List<T> {
    fn from_obj(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        let len = obj.list_len()?;
        Ok(List {
            interp: interp.clone(),
            obj: obj.clone(),
            len,
            _marker: PhantomData,
        })
    }

    fn label(_registry: &TypeRegistry) -> String {
        "list".to_string()
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        <T as FromObj>::requirements(out);
    }
}

pub struct ListIter<'a, T> {
    list: &'a List<T>,
    index: usize,
}

impl<T: FromObj> Iterator for ListIter<'_, T> {
    type Item = Result<T, ConversionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.list.len {
            return None;
        }
        let item = self.list.get(self.index);
        self.index += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.list.len.saturating_sub(self.index);
        (left, Some(left))
    }
}

impl<'a, T: FromObj> IntoIterator for &'a List<T> {
    type Item = Result<T, ConversionError>;
    type IntoIter = ListIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_view_iterates_from_start_each_time() {
        let interp = Interp::new();
        let list = List::<i64>::from_obj(&interp, &Obj::from("1 2 3")).unwrap();
        assert_eq!(list.len(), 3);
        let first: i64 = list.iter().map(Result::unwrap).sum();
        let second: i64 = list.iter().map(Result::unwrap).sum();
        assert_eq!((first, second), (6, 6));
        assert!(list.get(3).is_none());
    }

    #[test]
    fn element_errors_surface_on_access() {
        let interp = Interp::new();
        let list = List::<i64>::from_obj(&interp, &Obj::from("1 x")).unwrap();
        assert!(list.get(0).unwrap().is_ok());
        assert!(list.get(1).unwrap().is_err());
        assert!(list.to_vec().is_err());
    }

    #[test]
    fn malformed_list_is_rejected() {
        let interp = Interp::new();
        assert!(List::<String>::from_obj(&interp, &Obj::from("{a")).is_err());
    }

    #[test]
    fn rest_binds_remaining_words() {
        let interp = Interp::new();
        let words = vec![Obj::from("a"), Obj::from("2"), Obj::from("3")];
        let mut frame = Frame::new(&interp, &words, 1, Vec::new(), None);
        let first = <String as Param>::bind(&mut frame).unwrap();
        let rest = Rest::<i64>::bind(&mut frame).unwrap();
        assert_eq!(first, "a");
        assert_eq!(rest.to_vec().unwrap(), vec![2, 3]);
        let empty = Rest::<i64>::bind(&mut frame).unwrap();
        assert!(empty.is_empty());
    }
}
