//! Parameter binding.
//!
//! Every parameter type of a bound callable implements [`Param`]. Its
//! [`ParamKind`] decides how the argument binder consumes words: one
//! positional word, an optional positional word, a getopt option, all
//! remaining words, or nothing at all (the interpreter context).
//!
//! [`Signature`] is the registration-time summary of a parameter list. It
//! validates the shape once and answers arity questions at call time.

use bitflags::bitflags;
use tclbind_core::{ConversionError, Interp, Obj, RegistrationError, TclError, TypeRegistry};

use crate::convert::{FromObj, TypeRequirement};
use crate::getopt::{self, OptionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Exactly one positional word.
    Required,
    /// One positional word if present.
    Optional,
    /// A `-name` option taken from the leading words.
    Option { flag: bool },
    /// All remaining positional words.
    Rest,
    /// The calling interpreter; consumes no words.
    Context,
}

pub type DefaultCheck = fn(&Interp, &str) -> Result<(), ConversionError>;

/// A type that can appear in a bound callable's parameter list.
pub trait Param: Sized + 'static {
    const KIND: ParamKind;

    fn label(registry: &TypeRegistry) -> String;

    fn requirements(_out: &mut Vec<TypeRequirement>) {}

    /// Validate an option default. Only meaningful for option parameters.
    fn check_default(_interp: &Interp, _literal: &str) -> Result<(), ConversionError> {
        Ok(())
    }

    fn bind(frame: &mut Frame<'_>) -> Result<Self, TclError>;
}

impl<T: FromObj> Param for T {
    const KIND: ParamKind = ParamKind::Required;

    fn label(registry: &TypeRegistry) -> String {
        <T as FromObj>::label(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        <T as FromObj>::requirements(out);
    }

    fn bind(frame: &mut Frame<'_>) -> Result<Self, TclError> {
        let obj = frame.next_positional()?;
        Ok(<T as FromObj>::from_obj(frame.interp(), &obj)?)
    }
}

impl Param for Interp {
    const KIND: ParamKind = ParamKind::Context;

    fn label(_registry: &TypeRegistry) -> String {
        String::new()
    }

    fn bind(frame: &mut Frame<'_>) -> Result<Self, TclError> {
        Ok(frame.interp().clone())
    }
}

// =============================================================================
// Optional positional
// =============================================================================

/// A trailing positional argument the caller may omit.
#[derive(Debug, Clone, PartialEq)]
pub struct Opt<T>(Option<T>);

impl<T> Opt<T> {
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn into_option(self) -> Option<T> {
        self.0
    }

    pub fn unwrap_or(self, default: impl Into<T>) -> T {
        self.0.unwrap_or_else(|| default.into())
    }
}

impl<T: FromObj> Param for Opt<T> {
    const KIND: ParamKind = ParamKind::Optional;

    fn label(registry: &TypeRegistry) -> String {
        <T as FromObj>::label(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        <T as FromObj>::requirements(out);
    }

    fn bind(frame: &mut Frame<'_>) -> Result<Self, TclError> {
        match frame.try_next_positional() {
            Some(obj) => Ok(Opt(Some(<T as FromObj>::from_obj(frame.interp(), &obj)?))),
            None => Ok(Opt(None)),
        }
    }
}

// =============================================================================
// Frame
// =============================================================================

/// Resolved value of one declared option.
#[derive(Debug, Clone)]
pub enum OptionValue {
    Given(Obj),
    Default(Obj),
    Absent,
}

/// The words of one invocation, consumed parameter by parameter.
pub struct Frame<'a> {
    interp: &'a Interp,
    positional: &'a [Obj],
    next: usize,
    required: usize,
    options: Vec<OptionValue>,
    next_option: usize,
    receiver: Option<Obj>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        interp: &'a Interp,
        positional: &'a [Obj],
        required: usize,
        options: Vec<OptionValue>,
        receiver: Option<Obj>,
    ) -> Self {
        Self {
            interp,
            positional,
            next: 0,
            required,
            options,
            next_option: 0,
            receiver,
        }
    }

    pub fn interp(&self) -> &'a Interp {
        self.interp
    }

    pub(crate) fn next_positional(&mut self) -> Result<Obj, TclError> {
        self.try_next_positional()
            .ok_or(TclError::TooFewArguments {
                given: self.positional.len(),
                required: self.required,
            })
    }

    pub(crate) fn try_next_positional(&mut self) -> Option<Obj> {
        let obj = self.positional.get(self.next)?.clone();
        self.next += 1;
        Some(obj)
    }

    pub(crate) fn take_remaining(&mut self) -> Vec<Obj> {
        let rest = self.positional[self.next.min(self.positional.len())..].to_vec();
        self.next = self.positional.len();
        rest
    }

    pub(crate) fn next_option(&mut self) -> OptionValue {
        let value = self
            .options
            .get(self.next_option)
            .cloned()
            .unwrap_or(OptionValue::Absent);
        self.next_option += 1;
        value
    }

    /// The object a method is invoked on.
    pub(crate) fn receiver(&self) -> Result<&Obj, TclError> {
        self.receiver
            .as_ref()
            .ok_or_else(|| TclError::native("method invoked without an object"))
    }
}

// =============================================================================
// Parameter lists
// =============================================================================

/// A tuple of [`Param`]s.
pub trait ParamList: 'static {
    fn kinds() -> Vec<ParamKind>;
    fn labels(registry: &TypeRegistry) -> Vec<String>;
    fn requirements(out: &mut Vec<TypeRequirement>);
    fn default_checks() -> Vec<DefaultCheck>;
}

macro_rules! impl_param_list {
    ($($P:ident),*) => {
        impl<$($P: Param,)*> ParamList for ($($P,)*) {
            fn kinds() -> Vec<ParamKind> {
                vec![$($P::KIND),*]
            }

            #[allow(unused_variables)]
            fn labels(registry: &TypeRegistry) -> Vec<String> {
                vec![$(<$P as Param>::label(registry)),*]
            }

            #[allow(unused_variables)]
            fn requirements(out: &mut Vec<TypeRequirement>) {
                $(<$P as Param>::requirements(out);)*
            }

            fn default_checks() -> Vec<DefaultCheck> {
                vec![$(<$P as Param>::check_default as DefaultCheck),*]
            }
        }
    };
}

impl_param_list!();
impl_param_list!(A);
impl_param_list!(A, B);
impl_param_list!(A, B, C);
impl_param_list!(A, B, C, D);
impl_param_list!(A, B, C, D, E);
impl_param_list!(A, B, C, D, E, F);
impl_param_list!(A, B, C, D, E, F, G);
impl_param_list!(A, B, C, D, E, F, G, H);
impl_param_list!(A, B, C, D, E, F, G, H, I);

// =============================================================================
// Signature
// =============================================================================

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SignatureFlags: u8 {
        const OPTIONS = 1 << 0;
        const OPTIONAL = 1 << 1;
        const REST = 1 << 2;
        const CONTEXT = 1 << 3;
    }
}

/// Validated shape of a parameter list.
#[derive(Debug, Clone)]
pub struct Signature {
    command: String,
    kinds: Vec<ParamKind>,
    labels: Vec<String>,
    options: Vec<OptionSpec>,
    min: usize,
    max: Option<usize>,
    flags: SignatureFlags,
}

impl Signature {
    /// Validate `P` for a command named `command`.
    ///
    /// `option_table` names the option parameters in declaration order:
    /// space-separated `name` or `name=default` entries.
    pub fn of<P: ParamList>(
        interp: &Interp,
        command: &str,
        option_table: Option<&str>,
    ) -> Result<Self, RegistrationError> {
        let kinds = P::kinds();
        let mut flags = SignatureFlags::empty();
        let mut min = 0;
        let mut optional = 0;

        for kind in &kinds {
            match kind {
                ParamKind::Required => {
                    if flags.contains(SignatureFlags::REST) {
                        return Err(RegistrationError::RestNotLast {
                            command: command.to_string(),
                        });
                    }
                    if flags.contains(SignatureFlags::OPTIONAL) {
                        return Err(RegistrationError::RequiredAfterOptional {
                            command: command.to_string(),
                        });
                    }
                    min += 1;
                }
                ParamKind::Optional => {
                    if flags.contains(SignatureFlags::REST) {
                        return Err(RegistrationError::RestNotLast {
                            command: command.to_string(),
                        });
                    }
                    flags |= SignatureFlags::OPTIONAL;
                    optional += 1;
                }
                ParamKind::Rest => {
                    if flags.contains(SignatureFlags::REST) {
                        return Err(RegistrationError::RestNotLast {
                            command: command.to_string(),
                        });
                    }
                    flags |= SignatureFlags::REST;
                }
                ParamKind::Option { .. } => flags |= SignatureFlags::OPTIONS,
                ParamKind::Context => flags |= SignatureFlags::CONTEXT,
            }
        }

        let mut requirements = Vec::new();
        P::requirements(&mut requirements);
        {
            let registry = interp.registry();
            for requirement in &requirements {
                if registry.lookup_type_id(requirement.type_id).is_none() {
                    return Err(RegistrationError::UnregisteredType {
                        command: command.to_string(),
                        type_name: requirement.type_name.to_string(),
                    });
                }
            }
        }

        let options = Self::build_options::<P>(interp, command, &kinds, option_table)?;
        let labels = P::labels(&interp.registry());
        let max = if flags.contains(SignatureFlags::REST) {
            None
        } else {
            Some(min + optional)
        };

        tracing::trace!(command, min, ?max, options = options.len(), "built signature");
        Ok(Self {
            command: command.to_string(),
            kinds,
            labels,
            options,
            min,
            max,
            flags,
        })
    }

    fn build_options<P: ParamList>(
        interp: &Interp,
        command: &str,
        kinds: &[ParamKind],
        option_table: Option<&str>,
    ) -> Result<Vec<OptionSpec>, RegistrationError> {
        let declared: Vec<bool> = kinds
            .iter()
            .filter_map(|kind| match kind {
                ParamKind::Option { flag } => Some(*flag),
                _ => None,
            })
            .collect();
        let entries = getopt::parse_table(command, option_table.unwrap_or(""))?;
        if entries.len() != declared.len() {
            return Err(RegistrationError::OptionTableArity {
                command: command.to_string(),
                expected: declared.len(),
                found: entries.len(),
            });
        }

        let checks: Vec<DefaultCheck> = P::default_checks()
            .into_iter()
            .zip(kinds)
            .filter(|(_, kind)| matches!(kind, ParamKind::Option { .. }))
            .map(|(check, _)| check)
            .collect();

        let mut options = Vec::with_capacity(entries.len());
        for (((name, default), flag), check) in entries.into_iter().zip(declared).zip(checks) {
            if let Some(literal) = &default {
                check(interp, literal).map_err(|err| RegistrationError::InvalidOptionDefault {
                    command: command.to_string(),
                    name: name.clone(),
                    message: err.to_string(),
                })?;
            }
            options.push(OptionSpec {
                name,
                default,
                flag,
            });
        }
        Ok(options)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn min_args(&self) -> usize {
        self.min
    }

    /// `None` when a rest parameter accepts any number of trailing words.
    pub fn max_args(&self) -> Option<usize> {
        self.max
    }

    pub fn flags(&self) -> SignatureFlags {
        self.flags
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Whether `given` raw argument words could satisfy this signature.
    /// Option words make the upper bound open.
    pub fn accepts(&self, given: usize) -> bool {
        if given < self.min {
            return false;
        }
        if self.has_options() {
            return true;
        }
        self.max.is_none_or(|max| given <= max)
    }

    /// Check the positional word count left after option parsing.
    pub fn check_arity(&self, given: usize) -> Result<(), TclError> {
        if given < self.min {
            return Err(TclError::TooFewArguments {
                given,
                required: self.min,
            });
        }
        if let Some(max) = self.max
            && given > max
        {
            return Err(TclError::TooManyArguments {
                given,
                allowed: max,
            });
        }
        Ok(())
    }

    /// Describe the accepted arity, e.g. `2`, `1-3` or `2+`.
    pub fn arity(&self) -> String {
        match self.max {
            _ if self.has_options() => format!("{}+", self.min),
            None => format!("{}+", self.min),
            Some(max) if max == self.min => max.to_string(),
            Some(max) => format!("{}-{}", self.min, max),
        }
    }

    /// A synthesized usage line: `name ?-flag? ?-opt type? arg ?arg? ?arg ...?`.
    pub fn usage(&self) -> String {
        let mut options = Vec::new();
        let mut positional = Vec::new();
        let mut specs = self.options.iter();
        for (kind, label) in self.kinds.iter().zip(&self.labels) {
            match kind {
                ParamKind::Required => positional.push(label.clone()),
                ParamKind::Optional => positional.push(format!("?{label}?")),
                ParamKind::Rest => positional.push(format!("?{label} ...?")),
                ParamKind::Option { flag } => {
                    let Some(spec) = specs.next() else { continue };
                    if *flag {
                        options.push(format!("?-{}?", spec.name));
                    } else {
                        options.push(format!("?-{} {label}?", spec.name));
                    }
                }
                ParamKind::Context => {}
            }
        }
        std::iter::once(self.command.clone())
            .chain(options)
            .chain(positional)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getopt::Getopt;
    use crate::views::Rest;
    use tclbind_core::Handle;

    struct Widget;

    #[test]
    fn arity_bounds() {
        let interp = Interp::new();
        let sig = Signature::of::<(i32, Opt<String>, Opt<i32>)>(&interp, "f", None).unwrap();
        assert_eq!(sig.min_args(), 1);
        assert_eq!(sig.max_args(), Some(3));
        assert!(sig.accepts(1) && sig.accepts(3) && !sig.accepts(4) && !sig.accepts(0));
        assert_eq!(sig.arity(), "1-3");
        let err = sig.check_arity(0).unwrap_err();
        assert_eq!(err.to_string(), "too few arguments: 0 given, 1 required");
        let err = sig.check_arity(5).unwrap_err();
        assert_eq!(err.to_string(), "too many arguments: 5 given, 3 allowed");
    }

    #[test]
    fn rest_is_unbounded() {
        let interp = Interp::new();
        let sig = Signature::of::<(String, Rest<i64>)>(&interp, "f", None).unwrap();
        assert_eq!(sig.max_args(), None);
        assert!(sig.accepts(40));
        assert_eq!(sig.arity(), "1+");
    }

    #[test]
    fn shape_errors() {
        let interp = Interp::new();
        let err = Signature::of::<(Rest<i64>, i32)>(&interp, "f", None).unwrap_err();
        assert!(matches!(err, RegistrationError::RestNotLast { .. }));
        let err = Signature::of::<(Opt<i64>, i32)>(&interp, "f", None).unwrap_err();
        assert!(matches!(err, RegistrationError::RequiredAfterOptional { .. }));
    }

    #[test]
    fn unregistered_native_parameter() {
        let interp = Interp::new();
        let err = Signature::of::<(Handle<Widget>,)>(&interp, "poke", None).unwrap_err();
        assert!(matches!(err, RegistrationError::UnregisteredType { .. }));
        interp.register_as::<Widget>("Widget").unwrap();
        assert!(Signature::of::<(Handle<Widget>,)>(&interp, "poke", None).is_ok());
    }

    #[test]
    fn context_consumes_nothing() {
        let interp = Interp::new();
        let sig = Signature::of::<(Interp, i32)>(&interp, "f", None).unwrap();
        assert_eq!(sig.min_args(), 1);
        assert!(sig.flags().contains(SignatureFlags::CONTEXT));
        assert_eq!(sig.usage(), "f int");
    }

    #[test]
    fn usage_line() {
        let interp = Interp::new();
        let sig = Signature::of::<(Getopt<bool>, Getopt<i64>, i64, Opt<String>, Rest<i64>)>(
            &interp,
            "run",
            Some("verbose count=3"),
        )
        .unwrap();
        assert_eq!(
            sig.usage(),
            "run ?-verbose? ?-count int? int ?string? ?int ...?"
        );
        assert_eq!(sig.arity(), "1+");
    }

    #[test]
    fn option_table_must_match() {
        let interp = Interp::new();
        let err = Signature::of::<(Getopt<bool>,)>(&interp, "f", None).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::OptionTableArity { expected: 1, found: 0, .. }
        ));
        let err = Signature::of::<(Getopt<i64>,)>(&interp, "f", Some("n=abc")).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidOptionDefault { .. }));
    }
}
