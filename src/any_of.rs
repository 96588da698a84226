//! Variant arguments: one parameter that accepts any of several native types.

use std::fmt;
use std::marker::PhantomData;

use tclbind_core::{ConversionError, Handle, Interp, Obj, TypeRegistry};

use crate::convert::{FromObj, TypeRequirement, native_label};
use crate::views::List;

/// One alternative of an [`AnyOf`].
pub trait Candidate: Sized + 'static {
    fn matches(interp: &Interp, obj: &Obj) -> bool;
    fn extract(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError>;
    fn label(registry: &TypeRegistry) -> String;
    fn requirements(_out: &mut Vec<TypeRequirement>) {}
}

impl<T: 'static> Candidate for Handle<T> {
    fn matches(interp: &Interp, obj: &Obj) -> bool {
        interp.holds::<T>(obj)
    }

    fn extract(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        interp.extract::<T>(obj)
    }

    fn label(registry: &TypeRegistry) -> String {
        native_label::<T>(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        out.push(TypeRequirement::of::<T>());
    }
}

/// A list whose every element matches `T`.
impl<T: Candidate + FromObj> Candidate for List<T> {
    fn matches(interp: &Interp, obj: &Obj) -> bool {
        obj.list_elements()
            .is_ok_and(|items| items.iter().all(|item| <T as Candidate>::matches(interp, item)))
    }

    fn extract(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        <List<T> as FromObj>::from_obj(interp, obj)
    }

    fn label(registry: &TypeRegistry) -> String {
        format!("list of {}", <T as Candidate>::label(registry))
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        <T as Candidate>::requirements(out);
    }
}

/// A tuple of [`Candidate`]s, tried in order.
pub trait CandidateSet: 'static {
    fn position(interp: &Interp, obj: &Obj) -> Option<usize>;
    fn labels(registry: &TypeRegistry) -> Vec<String>;
    fn requirements(out: &mut Vec<TypeRequirement>);
}

macro_rules! impl_candidate_set {
    ($($C:ident => $index:tt),+) => {
        impl<$($C: Candidate,)+> CandidateSet for ($($C,)+) {
            fn position(interp: &Interp, obj: &Obj) -> Option<usize> {
                $(
                    if <$C as Candidate>::matches(interp, obj) {
                        return Some($index);
                    }
                )+
                None
            }

            fn labels(registry: &TypeRegistry) -> Vec<String> {
                vec![$(<$C as Candidate>::label(registry)),+]
            }

            fn requirements(out: &mut Vec<TypeRequirement>) {
                $(<$C as Candidate>::requirements(out);)+
            }
        }
    };
}

impl_candidate_set!(A => 0);
impl_candidate_set!(A => 0, B => 1);
impl_candidate_set!(A => 0, B => 1, C => 2);
impl_candidate_set!(A => 0, B => 1, C => 2, D => 3);
impl_candidate_set!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_candidate_set!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);

/// An argument that may hold any of the candidate types in `S`.
///
/// Binding never fails: when no candidate matches, [`AnyOf::is_present`] is
/// false and the callee decides what to do.
pub struct AnyOf<S> {
    interp: Interp,
    obj: Obj,
    which: Option<usize>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: CandidateSet> AnyOf<S> {
    pub fn is_present(&self) -> bool {
        self.which.is_some()
    }

    /// Index of the first matching candidate.
    pub fn which(&self) -> Option<usize> {
        self.which
    }

    pub fn is<C: Candidate>(&self) -> bool {
        C::matches(&self.interp, &self.obj)
    }

    pub fn get<C: Candidate>(&self) -> Option<C> {
        if !self.is::<C>() {
            return None;
        }
        C::extract(&self.interp, &self.obj).ok()
    }

    pub fn obj(&self) -> &Obj {
        &self.obj
    }

    /// Run the first case whose candidate matches.
    pub fn visit<R>(&self) -> Visit<'_, S, R> {
        Visit {
            any: self,
            result: None,
        }
    }
}

impl<S> fmt::Debug for AnyOf<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyOf")
            .field("obj", &self.obj)
            .field("which", &self.which)
            .finish()
    }
}

impl<S: CandidateSet> FromObj for AnyOf<S> {
    fn from_obj(interp: &Interp, obj: &Obj) -> Result<Self, ConversionError> {
        Ok(AnyOf {
            interp: interp.clone(),
            obj: obj.clone(),
            which: S::position(interp, obj),
            _marker: PhantomData,
        })
    }

    fn label(registry: &TypeRegistry) -> String {
        S::labels(registry).join("|")
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        S::requirements(out);
    }
}

pub struct Visit<'a, S, R> {
    any: &'a AnyOf<S>,
    result: Option<R>,
}

impl<S: CandidateSet, R> Visit<'_, S, R> {
    pub fn case<C: Candidate>(mut self, f: impl FnOnce(C) -> R) -> Self {
        if self.result.is_none()
            && let Some(value) = self.any.get::<C>()
        {
            self.result = Some(f(value));
        }
        self
    }

    pub fn otherwise(self, f: impl FnOnce() -> R) -> R {
        self.result.unwrap_or_else(f)
    }

    pub fn finish(self) -> Option<R> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tclbind_core::Ownership;

    struct Circle(f64);
    struct Square(f64);

    fn setup() -> Interp {
        let interp = Interp::new();
        interp.register_as::<Circle>("Circle").unwrap();
        interp.register_as::<Square>("Square").unwrap();
        interp
    }

    type Shape = AnyOf<(Handle<Circle>, Handle<Square>, List<Handle<Square>>)>;

    #[test]
    fn first_matching_candidate_wins() {
        let interp = setup();
        let sq = interp.new_object(Square(2.0), Ownership::Exclusive).unwrap();
        let any = Shape::from_obj(&interp, &sq).unwrap();
        assert_eq!(any.which(), Some(1));
        assert!(any.is::<Handle<Square>>());
        assert!(any.get::<Handle<Circle>>().is_none());

        let area = any
            .visit()
            .case(|c: Handle<Circle>| 3.0 * c.borrow().0 * c.borrow().0)
            .case(|s: Handle<Square>| s.borrow().0 * s.borrow().0)
            .otherwise(|| 0.0);
        assert_eq!(area, 4.0);
    }

    #[test]
    fn list_candidate() {
        let interp = setup();
        let a = interp.new_object(Square(1.0), Ownership::Exclusive).unwrap();
        let b = interp.new_object(Square(2.0), Ownership::Exclusive).unwrap();
        let list = Obj::from_list(vec![a, b]);
        let any = Shape::from_obj(&interp, &list).unwrap();
        assert_eq!(any.which(), Some(2));
        let squares = any.get::<List<Handle<Square>>>().unwrap();
        assert_eq!(squares.len(), 2);
    }

    #[test]
    fn nothing_matches() {
        let interp = setup();
        let any = Shape::from_obj(&interp, &Obj::from("x y")).unwrap();
        assert!(!any.is_present());
        assert!(any.visit::<i32>().case(|_: Handle<Circle>| 1).finish().is_none());
    }

    #[test]
    fn label_joins_candidates() {
        let interp = setup();
        assert_eq!(
            Shape::label(&interp.registry()),
            "Circle|Square|list of Square"
        );
    }
}
