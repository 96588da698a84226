//! Getopt-style `-name value` options.
//!
//! Option parameters are declared with [`Getopt`] in the parameter list and
//! named by an option table given at registration, e.g. `"verbose count=3"`.
//! Options are read from the leading words of a call; scanning stops at `--`
//! or at the first word that does not look like an option.

use tclbind_core::{ConversionError, Interp, Obj, RegistrationError, TclError, TypeRegistry};

use crate::convert::{FromObj, TypeRequirement};
use crate::param::{Frame, OptionValue, Param, ParamKind, Signature};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: String,
    pub default: Option<String>,
    /// Flags take no value word.
    pub flag: bool,
}

/// Parse an option table into `(name, default)` entries.
pub(crate) fn parse_table(
    command: &str,
    table: &str,
) -> Result<Vec<(String, Option<String>)>, RegistrationError> {
    let mut entries: Vec<(String, Option<String>)> = Vec::new();
    for entry in table.split_whitespace() {
        let (name, default) = match entry.split_once('=') {
            Some((name, default)) => (name, Some(default.to_string())),
            None => (entry, None),
        };
        let name = name.strip_prefix('-').unwrap_or(name);
        if name.is_empty() {
            return Err(RegistrationError::InvalidOptionTable {
                command: command.to_string(),
                message: format!("entry \"{entry}\" has no option name"),
            });
        }
        if entries.iter().any(|(existing, _)| existing == name) {
            return Err(RegistrationError::DuplicateOption {
                command: command.to_string(),
                name: name.to_string(),
            });
        }
        entries.push((name.to_string(), default));
    }
    Ok(entries)
}

/// `-x` where `x` is not a digit or `.`; negative numbers are positionals.
fn looks_like_option(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next() == Some('-')
        && chars
            .next()
            .is_some_and(|c| !c.is_ascii_digit() && c != '.')
}

#[derive(Debug)]
pub(crate) enum Scanned {
    /// A lone `-help` asked for the usage line.
    Help,
    Parsed {
        values: Vec<OptionValue>,
        /// Number of leading words consumed by options.
        consumed: usize,
    },
}

/// Read the leading option words of `args`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn scan(signature: &Signature, args: &[Obj], help: bool) -> Result<Scanned, TclError> {
    let specs = signature.options();
    let mut given: Vec<Option<Obj>> = vec![None; specs.len()];
    let mut i = 0;

    while i < args.len() {
        let word = args[i].as_rc_str();
        if &*word == "--" {
            i += 1;
            break;
        }
        if !looks_like_option(&word) {
            break;
        }
        let name = &word[1..];
        let Some(index) = specs.iter().position(|spec| spec.name == name) else {
            if help && name == "help" && args.len() == 1 {
                return Ok(Scanned::Help);
            }
            return Err(TclError::UnknownOption {
                option: word.to_string(),
            });
        };
        if specs[index].flag {
            given[index] = Some(Obj::from_bool(true));
            i += 1;
        } else {
            let value = args.get(i + 1).ok_or_else(|| TclError::MissingOptionValue {
                option: word.to_string(),
            })?;
            given[index] = Some(value.clone());
            i += 2;
        }
    }

    let values = given
        .into_iter()
        .zip(specs)
        .map(|(value, spec)| match (value, &spec.default) {
            (Some(value), _) => OptionValue::Given(value),
            (None, Some(default)) => OptionValue::Default(Obj::from(default.as_str())),
            (None, None) => OptionValue::Absent,
        })
        .collect();
    Ok(Scanned::Parsed {
        values,
        consumed: i,
    })
}

/// An option parameter. Holds the given value, the table default, or nothing.
///
/// A `Getopt<bool>` is a flag: `-verbose` alone sets it.
#[derive(Debug, Clone, PartialEq)]
pub struct Getopt<T> {
    value: Option<T>,
    given: bool,
}

impl<T> Getopt<T> {
    /// Whether the caller named this option.
    pub fn is_set(&self) -> bool {
        self.given
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_option(self) -> Option<T> {
        self.value
    }

    pub fn unwrap_or(self, default: impl Into<T>) -> T {
        self.value.unwrap_or_else(|| default.into())
    }
}

impl<T: FromObj> Param for Getopt<T> {
    const KIND: ParamKind = ParamKind::Option {
        flag: <T as FromObj>::IS_FLAG,
    };

    fn label(registry: &TypeRegistry) -> String {
        <T as FromObj>::label(registry)
    }

    fn requirements(out: &mut Vec<TypeRequirement>) {
        <T as FromObj>::requirements(out);
    }

    fn check_default(interp: &Interp, literal: &str) -> Result<(), ConversionError> {
        <T as FromObj>::from_obj(interp, &Obj::from(literal)).map(|_| ())
    }

    fn bind(frame: &mut Frame<'_>) -> Result<Self, TclError> {
        let (obj, given) = match frame.next_option() {
            OptionValue::Given(obj) => (obj, true),
            OptionValue::Default(obj) => (obj, false),
            OptionValue::Absent => {
                return Ok(Getopt {
                    value: None,
                    given: false,
                });
            }
        };
        let value = <T as FromObj>::from_obj(frame.interp(), &obj)?;
        Ok(Getopt {
            value: Some(value),
            given,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &[&str]) -> Vec<Obj> {
        text.iter().map(|w| Obj::from(*w)).collect()
    }

    fn signature(interp: &Interp) -> Signature {
        Signature::of::<(Getopt<bool>, Getopt<i64>, String)>(interp, "cmd", Some("verbose count=3"))
            .unwrap()
    }

    fn parsed(scanned: Scanned) -> (Vec<OptionValue>, usize) {
        match scanned {
            Scanned::Parsed { values, consumed } => (values, consumed),
            Scanned::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn table_parsing() {
        let entries = parse_table("c", "a b=1 -c=x").unwrap();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), None),
                ("b".to_string(), Some("1".to_string())),
                ("c".to_string(), Some("x".to_string())),
            ]
        );
        assert!(matches!(
            parse_table("c", "a a"),
            Err(RegistrationError::DuplicateOption { .. })
        ));
        assert!(matches!(
            parse_table("c", "=3"),
            Err(RegistrationError::InvalidOptionTable { .. })
        ));
    }

    #[test]
    fn option_detection() {
        assert!(looks_like_option("-v"));
        assert!(!looks_like_option("-5"));
        assert!(!looks_like_option("-.5"));
        assert!(!looks_like_option("-"));
        assert!(!looks_like_option("x"));
    }

    #[test]
    fn flags_values_and_defaults() {
        let interp = Interp::new();
        let sig = signature(&interp);
        let (values, consumed) = parsed(scan(&sig, &words(&["-verbose", "x"]), true).unwrap());
        assert_eq!(consumed, 1);
        assert!(matches!(&values[0], OptionValue::Given(v) if v.get_bool().unwrap()));
        assert!(matches!(&values[1], OptionValue::Default(v) if v.as_string() == "3"));

        let (values, consumed) =
            parsed(scan(&sig, &words(&["-count", "9", "--", "-verbose"]), true).unwrap());
        assert_eq!(consumed, 3);
        assert!(matches!(values[0], OptionValue::Absent));
        assert!(matches!(&values[1], OptionValue::Given(v) if v.as_string() == "9"));
    }

    #[test]
    fn scan_errors() {
        let interp = Interp::new();
        let sig = signature(&interp);
        let err = scan(&sig, &words(&["-bogus", "x"]), true).unwrap_err();
        assert_eq!(err.to_string(), "unknown option \"-bogus\"");
        let err = scan(&sig, &words(&["-count"]), true).unwrap_err();
        assert!(matches!(err, TclError::MissingOptionValue { .. }));
    }

    #[test]
    fn lone_help() {
        let interp = Interp::new();
        let sig = signature(&interp);
        assert!(matches!(
            scan(&sig, &words(&["-help"]), true).unwrap(),
            Scanned::Help
        ));
        assert!(scan(&sig, &words(&["-help"]), false).is_err());
        assert!(scan(&sig, &words(&["-help", "x"]), true).is_err());
    }

    #[test]
    fn negative_numbers_are_positional() {
        let interp = Interp::new();
        let sig = signature(&interp);
        let (_, consumed) = parsed(scan(&sig, &words(&["-5"]), true).unwrap());
        assert_eq!(consumed, 0);
    }
}
