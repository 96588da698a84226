//! Turning Rust closures and functions into invokers.
//!
//! A callable's parameter list is read off its type: each parameter must be
//! a [`Param`], the return type an [`IntoObj`]. The marker type parameter
//! on the `Into*` traits exists only to keep the per-arity impls apart.
//!
//! Parameters are bound before the receiver is borrowed, and panics raised
//! by the callable are caught and reported as command errors.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tclbind_core::{Obj, TclError};

use crate::convert::{IntoObj, New};
use crate::param::{Frame, Param, ParamList};

/// A bound callable with its parameter binding baked in.
pub type Invoker = Rc<dyn Fn(&mut Frame<'_>) -> Result<Obj, TclError>>;

/// A free function usable as a command.
pub trait IntoCommand<Marker>: 'static {
    type Params: ParamList;

    fn into_invoker(self) -> Invoker;
}

/// A method on `C`, taking `&C` or `&mut C` first.
pub trait IntoMethod<C, Marker>: 'static {
    type Params: ParamList;

    fn into_invoker(self) -> Invoker;
}

/// A constructor producing a `C`.
pub trait IntoConstructor<C, Marker>: 'static {
    type Params: ParamList;

    fn into_invoker(self) -> Invoker;
}

/// Run `f`, turning a panic into an error carrying the panic message.
pub(crate) fn guard<R>(f: impl FnOnce() -> R) -> Result<R, TclError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_error)
}

fn panic_error(payload: Box<dyn Any + Send>) -> TclError {
    let err = if let Some(message) = payload.downcast_ref::<&str>() {
        TclError::native(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        TclError::native(message.clone())
    } else {
        TclError::Unknown
    };
    tracing::warn!(error = %err, "native callable panicked");
    err
}

macro_rules! impl_callables {
    ($($p:ident: $P:ident),*) => {
        impl<Func, R, $($P,)*> IntoCommand<fn($($P,)*) -> R> for Func
        where
            Func: Fn($($P),*) -> R + 'static,
            R: IntoObj + 'static,
            $($P: Param,)*
        {
            type Params = ($($P,)*);

            #[allow(unused_variables)]
            fn into_invoker(self) -> Invoker {
                Rc::new(move |frame: &mut Frame<'_>| {
                    $(let $p = <$P as Param>::bind(frame)?;)*
                    let out = guard(|| (self)($($p),*))?;
                    out.into_obj(frame.interp())
                })
            }
        }

        impl<Func, C, R, $($P,)*> IntoMethod<C, fn(&C, $($P,)*) -> R> for Func
        where
            Func: Fn(&C, $($P),*) -> R + 'static,
            C: 'static,
            R: IntoObj + 'static,
            $($P: Param,)*
        {
            type Params = ($($P,)*);

            fn into_invoker(self) -> Invoker {
                Rc::new(move |frame: &mut Frame<'_>| {
                    $(let $p = <$P as Param>::bind(frame)?;)*
                    let this = frame.interp().extract::<C>(frame.receiver()?)?;
                    let out = guard(|| -> Result<R, TclError> {
                        let this = this.try_borrow()?;
                        Ok((self)(&*this, $($p),*))
                    })??;
                    out.into_obj(frame.interp())
                })
            }
        }

        impl<Func, C, R, $($P,)*> IntoMethod<C, fn(&mut C, $($P,)*) -> R> for Func
        where
            Func: Fn(&mut C, $($P),*) -> R + 'static,
            C: 'static,
            R: IntoObj + 'static,
            $($P: Param,)*
        {
            type Params = ($($P,)*);

            fn into_invoker(self) -> Invoker {
                Rc::new(move |frame: &mut Frame<'_>| {
                    $(let $p = <$P as Param>::bind(frame)?;)*
                    let this = frame.interp().extract::<C>(frame.receiver()?)?;
                    let out = guard(|| -> Result<R, TclError> {
                        let mut this = this.try_borrow_mut()?;
                        Ok((self)(&mut *this, $($p),*))
                    })??;
                    out.into_obj(frame.interp())
                })
            }
        }

        impl<Func, C, $($P,)*> IntoConstructor<C, fn($($P,)*) -> C> for Func
        where
            Func: Fn($($P),*) -> C + 'static,
            C: 'static,
            $($P: Param,)*
        {
            type Params = ($($P,)*);

            #[allow(unused_variables)]
            fn into_invoker(self) -> Invoker {
                Rc::new(move |frame: &mut Frame<'_>| {
                    $(let $p = <$P as Param>::bind(frame)?;)*
                    let value = guard(|| (self)($($p),*))?;
                    New(value).into_obj(frame.interp())
                })
            }
        }
    };
}

impl_callables!();
impl_callables!(a: A);
impl_callables!(a: A, b: B);
impl_callables!(a: A, b: B, c: Cc);
impl_callables!(a: A, b: B, c: Cc, d: D);
impl_callables!(a: A, b: B, c: Cc, d: D, e: E);
impl_callables!(a: A, b: B, c: Cc, d: D, e: E, f: F);
impl_callables!(a: A, b: B, c: Cc, d: D, e: E, f: F, g: G);
impl_callables!(a: A, b: B, c: Cc, d: D, e: E, f: F, g: G, h: H);
impl_callables!(a: A, b: B, c: Cc, d: D, e: E, f: F, g: G, h: H, i: I);

#[cfg(test)]
mod tests {
    use super::*;
    use tclbind_core::Interp;

    fn call<M>(f: impl IntoCommand<M>, words: &[&str]) -> Result<Obj, TclError> {
        let interp = Interp::new();
        let invoker = f.into_invoker();
        let words: Vec<Obj> = words.iter().map(|w| Obj::from(*w)).collect();
        let mut frame = Frame::new(&interp, &words, words.len(), Vec::new(), None);
        invoker(&mut frame)
    }

    #[test]
    fn binds_in_order() {
        let out = call(|a: i32, b: String| format!("{b}{a}"), &["4", "x"]).unwrap();
        assert_eq!(out.as_string(), "x4");
    }

    #[test]
    fn conversion_failure_propagates() {
        let err = call(|a: i32| a, &["nope"]).unwrap_err();
        assert_eq!(err.to_string(), "expected integer but got \"nope\"");
    }

    #[test]
    fn panics_become_errors() {
        let err = call(|| -> i32 { panic!("bad input") }, &[]).unwrap_err();
        assert_eq!(err.to_string(), "bad input");
        let err = call(|n: i32| -> i32 { panic!("n was {n}") }, &["3"]).unwrap_err();
        assert_eq!(err.to_string(), "n was 3");
        let err = call(|| -> i32 { std::panic::panic_any(17u8) }, &[]).unwrap_err();
        assert_eq!(err, TclError::Unknown);
        assert_eq!(err.to_string(), "Unknown error.");
    }

    #[test]
    fn unit_result_is_empty() {
        assert_eq!(call(|| (), &[]).unwrap().as_string(), "");
    }
}
