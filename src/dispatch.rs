//! Invoking one bound callable.
//!
//! A call moves through fixed stages: option scanning, the arity check,
//! parameter binding in declaration order, the native call, and finally the
//! factory and sink post-processing declared by the binding's [`Policies`].

use std::fmt;

use tclbind_core::{Interp, InterpProperty, Obj, RegistrationError, TclError};

use crate::callable::Invoker;
use crate::class_builder;
use crate::getopt::{self, Scanned};
use crate::param::{Frame, ParamList, Signature};
use crate::policies::Policies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `name arg ...`
    Command,
    /// `handle method arg ...`
    Method,
}

impl CallKind {
    /// Index of the first argument word.
    pub fn offset(self) -> usize {
        match self {
            CallKind::Command => 1,
            CallKind::Method => 2,
        }
    }
}

/// A validated binding: signature, invoker and policies.
pub struct Callback {
    signature: Signature,
    invoker: Invoker,
    policies: Policies,
    kind: CallKind,
}

impl Callback {
    pub(crate) fn new<P: ParamList>(
        interp: &Interp,
        name: &str,
        invoker: Invoker,
        policies: Policies,
        kind: CallKind,
    ) -> Result<Self, RegistrationError> {
        let signature = Signature::of::<P>(interp, name, policies.options.as_deref())?;
        for &index in &policies.sinks {
            let in_range = index >= 1
                && (signature.has_options() || signature.max_args().is_none_or(|max| index <= max));
            if !in_range {
                return Err(RegistrationError::SinkOutOfRange {
                    command: name.to_string(),
                    index,
                });
            }
        }
        tracing::debug!(
            command = name,
            ?kind,
            arity = %signature.arity(),
            factory = policies.factory.as_deref(),
            "bound callable"
        );
        Ok(Self {
            signature,
            invoker,
            policies,
            kind,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// The usage policy's message, or the synthesized usage line.
    pub fn usage_line(&self) -> String {
        match &self.policies.usage {
            Some(message) => message.clone(),
            None => self.signature.usage(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn invoke(
        &self,
        interp: &Interp,
        objv: &[Obj],
        receiver: Option<Obj>,
    ) -> Result<Obj, TclError> {
        let args = objv.get(self.kind.offset()..).unwrap_or(&[]);

        let (options, positional) = if self.signature.has_options() {
            let help = interp.flag(InterpProperty::SynthesizeHelp);
            match getopt::scan(&self.signature, args, help)? {
                Scanned::Help => return Ok(Obj::from(self.usage_line())),
                Scanned::Parsed { values, consumed } => (values, &args[consumed..]),
            }
        } else {
            (Vec::new(), args)
        };

        if let Err(err) = self.signature.check_arity(positional.len()) {
            return Err(match &self.policies.usage {
                Some(message) => TclError::Usage {
                    message: message.clone(),
                },
                None => err,
            });
        }

        tracing::trace!(
            command = self.signature.command(),
            argc = positional.len(),
            "dispatch"
        );
        let mut frame = Frame::new(
            interp,
            positional,
            self.signature.min_args(),
            options,
            receiver,
        );
        let mut result = (self.invoker)(&mut frame)?;
        drop(frame);

        if let Some(class) = &self.policies.factory {
            result = class_builder::adopt(interp, class, result)?;
        }
        for &index in &self.policies.sinks {
            let Some(word) = objv.get(self.kind.offset() - 1 + index) else {
                continue;
            };
            let name = word.as_rc_str();
            if !interp.delete_command(&name) {
                tracing::trace!(command = %name, "sink argument names no command");
            }
        }
        Ok(result)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("signature", &self.signature)
            .field("policies", &self.policies)
            .field("kind", &self.kind)
            .finish()
    }
}
