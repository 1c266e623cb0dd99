//! The flag-set capability.
//!
//! The dispatcher never parses flags itself. Every subcommand (and the top
//! level) owns a [`FlagSet`], which registers typed flags, parses a token list
//! and reports what it found. [`ClapFlagSet`](crate::ClapFlagSet) is the stock
//! implementation; anything else implementing the trait can be plugged in via
//! [`DispatcherBuilder::flag_sets`](crate::DispatcherBuilder::flag_sets).
//!
//! # Values
//!
//! Registering a flag returns a [`Value`] handle. The handle holds the default
//! until the set is parsed, then the parsed value. Handlers capture the handles
//! they need:
//!
//! ```rust
//! use cmdopt::{ClapFlagSet, ErrorHandling, FlagSet};
//!
//! let mut fs = ClapFlagSet::new("serve", ErrorHandling::Continue);
//! let port = fs.int("port", 8080, "port to listen on");
//!
//! fs.parse(&["-port".to_string(), "9000".to_string()]).unwrap();
//! assert_eq!(port.get(), 9000);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::FlagError;

/// What a flag set does when parsing fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandling {
    /// Report the error and return it to the caller.
    #[default]
    Continue,
    /// Report the error and exit the process (status 0 for help, 2 otherwise).
    Exit,
    /// Report the error and panic.
    Panic,
}

/// Shared handle to a flag's value.
///
/// Cloning the handle shares the underlying slot.
pub struct Value<T>(Rc<RefCell<T>>);

impl<T> Value<T> {
    /// Creates a handle holding `initial`.
    pub fn new(initial: T) -> Self {
        Self(Rc::new(RefCell::new(initial)))
    }

    /// Replaces the held value.
    ///
    /// Flag set implementations call this once a token has been parsed.
    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }
}

impl<T: Clone> Value<T> {
    /// Returns a copy of the held value.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&*self.0.borrow()).finish()
    }
}

/// The value type of a registered flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Duration,
    /// Custom flag whose value is handed to a callback.
    Func,
}

impl FlagKind {
    /// Name shown next to the flag in the defaults listing.
    ///
    /// Boolean flags take no value, so they have no type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagKind::Bool => "",
            FlagKind::Int => "int",
            FlagKind::Uint => "uint",
            FlagKind::Float => "float",
            FlagKind::String => "string",
            FlagKind::Duration => "duration",
            FlagKind::Func => "value",
        }
    }

    fn is_zero(&self, default: &str) -> bool {
        match self {
            FlagKind::Bool => default == "false",
            FlagKind::Int | FlagKind::Uint => default == "0",
            FlagKind::Float => default.parse::<f64>().map(|v| v == 0.0).unwrap_or(false),
            FlagKind::String | FlagKind::Func => default.is_empty(),
            FlagKind::Duration => default == "0s",
        }
    }
}

/// Metadata of one registered flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    /// Name without the leading dash.
    pub name: String,
    /// One-line help text.
    pub usage: String,
    /// Default value, formatted.
    pub default: String,
    pub kind: FlagKind,
}

impl Flag {
    pub fn new(
        name: impl Into<String>,
        kind: FlagKind,
        default: impl Into<String>,
        usage: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            default: default.into(),
            kind,
        }
    }
}

/// Callback receiving each value given to a [`FlagSet::func`] flag.
pub type FlagFn = Box<dyn Fn(&str) -> anyhow::Result<()>>;

/// Capability interface over a name-value flag parser.
pub trait FlagSet {
    /// Name of the set; the subcommand name, or empty for the top level.
    fn name(&self) -> &str;

    /// Policy applied when [`parse`](FlagSet::parse) fails.
    fn error_handling(&self) -> ErrorHandling;

    fn bool(&mut self, name: &str, default: bool, usage: &str) -> Value<bool>;

    fn int(&mut self, name: &str, default: i64, usage: &str) -> Value<i64>;

    fn uint(&mut self, name: &str, default: u64, usage: &str) -> Value<u64>;

    fn float(&mut self, name: &str, default: f64, usage: &str) -> Value<f64>;

    fn string(&mut self, name: &str, default: &str, usage: &str) -> Value<String>;

    fn duration(&mut self, name: &str, default: Duration, usage: &str) -> Value<Duration>;

    /// Defines a flag that takes a value and passes it to `apply`, once per
    /// occurrence and in order. An error from `apply` fails the parse.
    fn func(&mut self, name: &str, usage: &str, apply: FlagFn);

    /// Sets the flag `name` from its textual form, as if it had been given on
    /// the command line.
    fn set(&mut self, name: &str, value: &str) -> Result<(), FlagError>;

    /// Number of flags that have been set, by parsing or by [`set`](FlagSet::set).
    fn nflag(&self) -> usize;

    /// Parses `args`, updating every registered [`Value`] and collecting the
    /// positional arguments.
    ///
    /// Returns [`FlagError::Help`] when the arguments ask for help.
    fn parse(&mut self, args: &[String]) -> Result<(), FlagError>;

    /// Registered flags, sorted by name.
    fn flags(&self) -> Vec<Flag>;

    /// Positional arguments left after the last parse.
    fn args(&self) -> &[String];

    /// The `i`th positional argument, if present.
    fn arg(&self, i: usize) -> Option<&str> {
        self.args().get(i).map(String::as_str)
    }

    /// Number of positional arguments.
    fn narg(&self) -> usize {
        self.args().len()
    }

    /// Metadata of the flag `name`, if defined.
    fn lookup(&self, name: &str) -> Option<Flag> {
        self.flags().into_iter().find(|flag| flag.name == name)
    }

    /// Renders the flag defaults listing used for `{{flags}}`.
    fn defaults(&self) -> String {
        render_defaults(&self.flags())
    }
}

impl fmt::Debug for dyn FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name())
            .field("flags", &self.flags().len())
            .finish_non_exhaustive()
    }
}

/// Renders `flags` as an indented listing, one entry per flag:
///
/// ```text
///   -name type
///     	usage (default value)
/// ```
///
/// Single-letter boolean flags keep their usage on the first line.
pub fn render_defaults(flags: &[Flag]) -> String {
    let mut sorted: Vec<&Flag> = flags.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::new();
    for flag in sorted {
        out.push_str("  -");
        out.push_str(&flag.name);

        let type_name = flag.kind.type_name();
        if !type_name.is_empty() {
            out.push(' ');
            out.push_str(type_name);
        }

        if flag.name.chars().count() == 1 && type_name.is_empty() {
            out.push('\t');
        } else {
            out.push_str("\n    \t");
        }
        out.push_str(&flag.usage.replace('\n', "\n    \t"));

        if !flag.kind.is_zero(&flag.default) {
            if flag.kind == FlagKind::String {
                out.push_str(&format!(" (default {:?})", flag.default));
            } else {
                out.push_str(&format!(" (default {})", flag.default));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_shared_between_clones() {
        let value = Value::new(1);
        let clone = value.clone();
        clone.set(5);
        assert_eq!(value.get(), 5);
    }

    #[test]
    fn test_value_debug() {
        let value = Value::new("x".to_string());
        assert_eq!(format!("{:?}", value), "Value(\"x\")");
    }

    #[test]
    fn test_render_defaults_empty() {
        assert_eq!(render_defaults(&[]), "");
    }

    #[test]
    fn test_render_defaults_int_zero_default() {
        let flags = vec![Flag::new("int", FlagKind::Int, "0", "int usage")];
        assert_eq!(render_defaults(&flags), "  -int int\n    \tint usage\n");
    }

    #[test]
    fn test_render_defaults_shows_non_zero_default() {
        let flags = vec![Flag::new("port", FlagKind::Uint, "8080", "listen port")];
        assert_eq!(
            render_defaults(&flags),
            "  -port uint\n    \tlisten port (default 8080)\n"
        );
    }

    #[test]
    fn test_render_defaults_quotes_strings() {
        let flags = vec![Flag::new("name", FlagKind::String, "bob", "user name")];
        assert_eq!(
            render_defaults(&flags),
            "  -name string\n    \tuser name (default \"bob\")\n"
        );
    }

    #[test]
    fn test_render_defaults_short_bool_same_line() {
        let flags = vec![
            Flag::new("v", FlagKind::Bool, "false", "verbose"),
            Flag::new("dry", FlagKind::Bool, "true", "dry run"),
        ];
        assert_eq!(
            render_defaults(&flags),
            "  -dry\n    \tdry run (default true)\n  -v\tverbose\n"
        );
    }

    #[test]
    fn test_render_defaults_float_zero() {
        let flags = vec![Flag::new("ratio", FlagKind::Float, "0", "ratio")];
        assert_eq!(render_defaults(&flags), "  -ratio float\n    \tratio\n");
    }

    #[test]
    fn test_render_defaults_duration_and_func() {
        let flags = vec![
            Flag::new("timeout", FlagKind::Duration, "1m30s", "how long to wait"),
            Flag::new("tag", FlagKind::Func, "", "add a tag"),
            Flag::new("delay", FlagKind::Duration, "0s", "initial delay"),
        ];
        assert_eq!(
            render_defaults(&flags),
            "  -delay duration\n    \tinitial delay\n  -tag value\n    \tadd a tag\n  -timeout duration\n    \thow long to wait (default 1m30s)\n"
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FlagKind::Bool.type_name(), "");
        assert_eq!(FlagKind::Int.type_name(), "int");
        assert_eq!(FlagKind::Float.type_name(), "float");
        assert_eq!(FlagKind::Duration.type_name(), "duration");
        assert_eq!(FlagKind::Func.type_name(), "value");
    }
}
