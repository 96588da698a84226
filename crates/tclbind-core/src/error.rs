//! Error types for the binding layer.
//!
//! Three layers:
//! - [`ConversionError`]: a value cell could not be read as the requested type.
//! - [`RegistrationError`]: a binding was malformed at registration time.
//! - [`TclError`]: everything a command invocation can fail with. This is what
//!   the interpreter reports as the command's error message.

use thiserror::Error;

/// Errors that can occur when reading a value cell as a native type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("expected integer but got \"{got}\"")]
    ExpectedInteger { got: String },

    #[error("expected floating-point number but got \"{got}\"")]
    ExpectedDouble { got: String },

    #[error("expected boolean value but got \"{got}\"")]
    ExpectedBoolean { got: String },

    /// Integer overflow during narrowing
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow { value: i64, target_type: &'static str },

    /// Float narrowing lost the value
    #[error("float conversion error: value {value} cannot be represented as {target_type}")]
    FloatConversion { value: f64, target_type: &'static str },

    #[error("invalid UTF-8 string data")]
    InvalidUtf8,

    /// The cell holds something other than the requested native type
    #[error("expected {expected} but got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A multi-element list was offered where a single native value is needed
    #[error("expected {expected} but got a list of {len} elements")]
    AmbiguousList { expected: String, len: usize },

    /// A native parameter type has no descriptor
    #[error("type {type_name} is not registered")]
    UnregisteredType { type_name: String },

    /// The cell refers to an object that has already been released
    #[error("object \"{token}\" has been deleted")]
    StaleHandle { token: String },

    #[error("cannot duplicate {type_name}: value is not copyable")]
    NotCopyable { type_name: String },

    /// The native value is currently borrowed mutably elsewhere
    #[error("{type_name} value is in use")]
    Busy { type_name: String },

    #[error("{message}")]
    ListSyntax { message: String },

    /// In-place mutation attempted on a cell that other holders can see
    #[error("cannot modify a shared value")]
    SharedObject,

    /// Generic conversion failure
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

impl ConversionError {
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ConversionError::Failed {
            message: message.into(),
        }
    }
}

/// Errors raised while building a binding. These indicate programming errors
/// and are reported before any command is installed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("type name \"{name}\" is already registered for {existing}")]
    NameTaken { name: String, existing: String },

    #[error("parameter type {type_name} of \"{command}\" is not registered")]
    UnregisteredType { command: String, type_name: String },

    #[error("option table of \"{command}\" names {found} options but the signature has {expected}")]
    OptionTableArity {
        command: String,
        expected: usize,
        found: usize,
    },

    #[error("option \"-{name}\" of \"{command}\" is declared twice")]
    DuplicateOption { command: String, name: String },

    #[error("invalid option table for \"{command}\": {message}")]
    InvalidOptionTable { command: String, message: String },

    #[error("default for option \"-{name}\" of \"{command}\" is invalid: {message}")]
    InvalidOptionDefault {
        command: String,
        name: String,
        message: String,
    },

    #[error("rest parameter of \"{command}\" must be the last positional parameter")]
    RestNotLast { command: String },

    #[error("required parameter of \"{command}\" follows an optional one")]
    RequiredAfterOptional { command: String },

    #[error("sink index {index} of \"{command}\" is out of range")]
    SinkOutOfRange { command: String, index: usize },

    #[error("class \"{name}\" is not registered")]
    UnknownClass { name: String },
}

/// Errors reported by command invocation and script evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TclError {
    #[error("too few arguments: {given} given, {required} required")]
    TooFewArguments { given: usize, required: usize },

    #[error("too many arguments: {given} given, {allowed} allowed")]
    TooManyArguments { given: usize, allowed: usize },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("unknown option \"{option}\"")]
    UnknownOption { option: String },

    #[error("option \"{option}\" requires a value")]
    MissingOptionValue { option: String },

    #[error("no overload of \"{name}\" accepts {given} arguments (accepted: {accepted})")]
    NoMatchingOverload {
        name: String,
        given: usize,
        accepted: String,
    },

    #[error("no such command \"{name}\"")]
    NoSuchCommand { name: String },

    #[error("Method {method} not found.")]
    UnknownMethod { method: String },

    #[error("wrong # args: should be \"{usage}\"")]
    WrongArgs { usage: String },

    #[error("Usage: {message}")]
    Usage { message: String },

    #[error("can't read \"{name}\": no such variable")]
    NoSuchVariable { name: String },

    #[error("Factory was registered for unknown class.")]
    FactoryUnknownClass { class: String },

    #[error("too many nested evaluations (infinite loop?)")]
    NestingTooDeep,

    /// Failure raised by a native callable
    #[error("{message}")]
    Native { message: String },

    /// A native callable failed with a payload that carries no message
    #[error("Unknown error.")]
    Unknown,

    /// Script syntax error
    #[error("{message}")]
    Script { message: String },
}

impl TclError {
    pub fn native(message: impl Into<String>) -> Self {
        TclError::Native {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        TclError::Script {
            message: message.into(),
        }
    }

    pub fn wrong_args(usage: impl Into<String>) -> Self {
        TclError::WrongArgs {
            usage: usage.into(),
        }
    }
}
