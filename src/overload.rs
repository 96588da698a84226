//! Overload sets: several callables under one name, chosen by arity.
//!
//! Candidates are tried in declaration order and the first whose arity
//! range admits the call wins. Parameter types play no part in the choice.

use std::cell::RefCell;
use std::rc::Rc;

use tclbind_core::{Interp, Obj, TclError};

use crate::dispatch::{CallKind, Callback};

#[derive(Debug)]
pub struct OverloadSet {
    name: String,
    kind: CallKind,
    callbacks: Vec<Rc<Callback>>,
}

impl OverloadSet {
    pub fn new(name: impl Into<String>, kind: CallKind) -> Self {
        Self {
            name: name.into(),
            kind,
            callbacks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Drop existing candidates and keep only `callback`.
    pub fn replace(&mut self, callback: Callback) {
        self.callbacks.clear();
        self.callbacks.push(Rc::new(callback));
    }

    /// Append a candidate. Overlapping arities are allowed; the earlier
    /// declaration wins.
    pub fn push(&mut self, callback: Callback) {
        for existing in &self.callbacks {
            if overlaps(existing, &callback) {
                tracing::warn!(
                    command = %self.name,
                    first = %existing.signature().arity(),
                    second = %callback.signature().arity(),
                    "overloads accept overlapping argument counts; the first declared wins"
                );
            }
        }
        self.callbacks.push(Rc::new(callback));
    }

    /// Pick the candidate for a call with `given` argument words.
    pub fn resolve(&self, given: usize) -> Result<Rc<Callback>, TclError> {
        match self.callbacks.as_slice() {
            [] => Err(TclError::NoSuchCommand {
                name: self.name.clone(),
            }),
            // a lone candidate reports its own arity error
            [single] => Ok(single.clone()),
            many => many
                .iter()
                .find(|callback| callback.signature().accepts(given))
                .cloned()
                .ok_or_else(|| TclError::NoMatchingOverload {
                    name: self.name.clone(),
                    given,
                    accepted: self.accepted(),
                }),
        }
    }

    fn accepted(&self) -> String {
        self.callbacks
            .iter()
            .map(|callback| callback.signature().arity())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn overlaps(a: &Callback, b: &Callback) -> bool {
    let upper = |callback: &Callback| {
        let signature = callback.signature();
        if signature.has_options() {
            None
        } else {
            signature.max_args()
        }
    };
    let (a_min, b_min) = (a.signature().min_args(), b.signature().min_args());
    let a_ok = upper(a).is_none_or(|max| b_min <= max);
    let b_ok = upper(b).is_none_or(|max| a_min <= max);
    a_ok && b_ok
}

/// Resolve and invoke. The set is not borrowed while the callable runs, so
/// callables may register new overloads.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn dispatch(
    interp: &Interp,
    set: &RefCell<OverloadSet>,
    objv: &[Obj],
    receiver: Option<Obj>,
) -> Result<Obj, TclError> {
    let callback = {
        let set = set.borrow();
        let given = objv.len().saturating_sub(set.kind.offset());
        set.resolve(given)?
    };
    callback.invoke(interp, objv, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::IntoCommand;
    use crate::param::Opt;
    use crate::policies::Policies;

    fn callback<M, F: IntoCommand<M>>(interp: &Interp, f: F) -> Callback {
        Callback::new::<F::Params>(
            interp,
            "area",
            f.into_invoker(),
            Policies::new(),
            CallKind::Command,
        )
        .unwrap()
    }

    fn words(text: &[&str]) -> Vec<Obj> {
        text.iter().map(|w| Obj::from(*w)).collect()
    }

    #[test]
    fn picks_by_arity_in_order() {
        let interp = Interp::new();
        let mut set = OverloadSet::new("area", CallKind::Command);
        set.push(callback(&interp, |r: f64| r * r * 3.0));
        set.push(callback(&interp, |w: f64, h: f64| w * h));
        let set = RefCell::new(set);

        let out = dispatch(&interp, &set, &words(&["area", "2"]), None).unwrap();
        assert_eq!(out.get_double().unwrap(), 12.0);
        let out = dispatch(&interp, &set, &words(&["area", "2", "5"]), None).unwrap();
        assert_eq!(out.get_double().unwrap(), 10.0);

        let err = dispatch(&interp, &set, &words(&["area"]), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no overload of \"area\" accepts 0 arguments (accepted: 1, 2)"
        );
    }

    #[test]
    fn first_declared_wins_on_overlap() {
        let interp = Interp::new();
        let mut set = OverloadSet::new("f", CallKind::Command);
        set.push(callback(&interp, |_: i64, _: Opt<i64>| "first"));
        set.push(callback(&interp, |_: i64, _: i64| "second"));
        let set = RefCell::new(set);
        let out = dispatch(&interp, &set, &words(&["f", "1", "2"]), None).unwrap();
        assert_eq!(out.as_string(), "first");
    }

    #[test]
    fn single_candidate_reports_arity() {
        let interp = Interp::new();
        let mut set = OverloadSet::new("add", CallKind::Command);
        set.replace(callback(&interp, |a: i64, b: i64| a + b));
        let set = RefCell::new(set);
        let err = dispatch(&interp, &set, &words(&["add", "2"]), None).unwrap_err();
        assert_eq!(err.to_string(), "too few arguments: 1 given, 2 required");
    }

    #[test]
    fn overlap_detection() {
        let interp = Interp::new();
        let one = callback(&interp, |_: i64| ());
        let two = callback(&interp, |_: i64, _: i64| ());
        let one_or_two = callback(&interp, |_: i64, _: Opt<i64>| ());
        assert!(!overlaps(&one, &two));
        assert!(overlaps(&one_or_two, &two));
        assert!(overlaps(&one, &one_or_two));
    }
}
