//! [`FlagSet`] implementation backed by clap.
//!
//! clap only knows `--long` options, while subcommand flags here use the
//! single-dash form (`-name value`, `-name=value`, `-v`). Before handing the
//! tokens to clap, every flag token up to the first positional argument is
//! rewritten to its double-dash spelling. Once a positional argument (or `--`)
//! is seen, everything after it is positional.
//!
//! A flag given more than once keeps its last value, except for
//! [`func`](FlagSet::func) flags, whose callback sees every occurrence.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::trace;

use crate::duration::{format_duration, parse_duration};
use crate::error::FlagError;
use crate::flags::{ErrorHandling, Flag, FlagFn, FlagKind, FlagSet, Value};

const ARGS_ID: &str = "cmdopt::args";
const HELP_ID: &str = "cmdopt::help";

/// Copies a flag's value out of the matches.
type Bind = Box<dyn Fn(&ArgMatches) -> Result<(), String>>;

/// Stores a flag's value given as text.
type Store = Box<dyn Fn(&str) -> Result<(), String>>;

struct Slot {
    flag: Flag,
    arg: Arg,
    bind: Bind,
    store: Store,
}

/// The default [`FlagSet`].
pub struct ClapFlagSet {
    name: String,
    error_handling: ErrorHandling,
    slots: Vec<Slot>,
    /// Names of the flags set so far.
    actual: BTreeSet<String>,
    positional: Vec<String>,
}

impl ClapFlagSet {
    pub fn new(name: impl Into<String>, error_handling: ErrorHandling) -> Self {
        Self {
            name: name.into(),
            error_handling,
            slots: Vec::new(),
            actual: BTreeSet::new(),
            positional: Vec::new(),
        }
    }

    /// Factory matching [`DispatcherBuilder::flag_sets`](crate::DispatcherBuilder::flag_sets).
    pub fn boxed(name: &str, error_handling: ErrorHandling) -> Box<dyn FlagSet> {
        Box::new(Self::new(name, error_handling))
    }

    fn defines(&self, name: &str) -> bool {
        self.slots.iter().any(|slot| slot.flag.name == name)
    }

    fn takes_value(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.flag.name == name && slot.flag.kind != FlagKind::Bool)
    }

    fn invalid(&self, message: String) -> FlagError {
        FlagError::Invalid {
            flag_set: self.name.clone(),
            message,
        }
    }

    fn define(&mut self, slot: Slot) {
        let name = &slot.flag.name;
        if name.is_empty() {
            panic!("{}: flag name must not be empty", self.name);
        }
        if name.starts_with('-') || name.contains('=') {
            panic!("{}: invalid flag name {:?}", self.name, name);
        }
        if self.defines(name) {
            panic!("{}: flag redefined: {}", self.name, name);
        }
        self.slots.push(slot);
    }

    /// Defines a flag whose clap value parser yields `T`; `parse` reads the
    /// same type back for [`FlagSet::set`].
    fn define_typed<T, P>(&mut self, flag: Flag, arg: Arg, value: Value<T>, parse: P)
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&str) -> Result<T, String> + 'static,
    {
        let id = flag.name.clone();
        let bound = value.clone();
        let bind: Bind = Box::new(move |matches: &ArgMatches| {
            if let Some(parsed) = matches.get_one::<T>(&id) {
                bound.set(parsed.clone());
            }
            Ok(())
        });
        let store: Store = Box::new(move |text: &str| {
            value.set(parse(text)?);
            Ok(())
        });
        self.define(Slot {
            flag,
            arg,
            bind,
            store,
        });
    }

    fn value_arg(name: &str, kind: FlagKind, usage: &str) -> Arg {
        Arg::new(name.to_string())
            .long(name.to_string())
            .value_name(kind.type_name())
            .help(usage.to_string())
            .num_args(1)
            .allow_hyphen_values(true)
            .action(ArgAction::Set)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .arg(
                Arg::new(ARGS_ID)
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .value_parser(clap::value_parser!(String))
                    .action(ArgAction::Append),
            );

        // Each help spelling stays a help request unless the set claims it.
        let help: Vec<&'static str> = ["help", "h"]
            .into_iter()
            .filter(|name| !self.defines(name))
            .collect();
        if let Some((long, aliases)) = help.split_first() {
            cmd = cmd.arg(
                Arg::new(HELP_ID)
                    .long(*long)
                    .aliases(aliases.iter().copied())
                    .action(ArgAction::Help)
                    .hide(true),
            );
        }

        cmd.args(self.slots.iter().map(|slot| slot.arg.clone()))
    }

    /// Rewrites single-dash flags to the double-dash form clap expects.
    fn normalize(&self, args: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(args.len());
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            if arg == "--" || arg == "-" || !arg.starts_with('-') {
                out.push(arg.clone());
                out.extend(iter.cloned());
                break;
            }

            let body = arg.strip_prefix("--").unwrap_or(&arg[1..]);
            out.push(format!("--{body}"));

            if !body.contains('=') && self.takes_value(body) {
                if let Some(value) = iter.next() {
                    out.push(value.clone());
                }
            }
        }

        out
    }

    fn translate(&self, err: clap::Error) -> FlagError {
        match err.kind() {
            ErrorKind::DisplayHelp => FlagError::Help,
            _ => {
                let text = err.to_string();
                let first = text.lines().next().unwrap_or_default();
                self.invalid(first.strip_prefix("error: ").unwrap_or(first).to_string())
            }
        }
    }
}

fn invalid_value(name: &str, value: &str, err: impl std::fmt::Display) -> String {
    format!("invalid value {value:?} for flag -{name}: {err}")
}

/// Accepts the same spellings as clap's boolish parser.
fn parse_bool(text: &str) -> Result<bool, String> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(format!("invalid boolean {text:?}")),
    }
}

impl FlagSet for ClapFlagSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    fn bool(&mut self, name: &str, default: bool, usage: &str) -> Value<bool> {
        let value = Value::new(default);
        let arg = Arg::new(name.to_string())
            .long(name.to_string())
            .help(usage.to_string())
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new())
            .action(ArgAction::Set);
        let flag = Flag::new(name, FlagKind::Bool, default.to_string(), usage);
        self.define_typed(flag, arg, value.clone(), parse_bool);
        value
    }

    fn int(&mut self, name: &str, default: i64, usage: &str) -> Value<i64> {
        let value = Value::new(default);
        let arg = Self::value_arg(name, FlagKind::Int, usage)
            .value_parser(clap::value_parser!(i64));
        let flag = Flag::new(name, FlagKind::Int, default.to_string(), usage);
        self.define_typed(flag, arg, value.clone(), |text| {
            text.parse::<i64>().map_err(|e| e.to_string())
        });
        value
    }

    fn uint(&mut self, name: &str, default: u64, usage: &str) -> Value<u64> {
        let value = Value::new(default);
        let arg = Self::value_arg(name, FlagKind::Uint, usage)
            .value_parser(clap::value_parser!(u64));
        let flag = Flag::new(name, FlagKind::Uint, default.to_string(), usage);
        self.define_typed(flag, arg, value.clone(), |text| {
            text.parse::<u64>().map_err(|e| e.to_string())
        });
        value
    }

    fn float(&mut self, name: &str, default: f64, usage: &str) -> Value<f64> {
        let value = Value::new(default);
        let arg = Self::value_arg(name, FlagKind::Float, usage)
            .value_parser(clap::value_parser!(f64));
        let flag = Flag::new(name, FlagKind::Float, default.to_string(), usage);
        self.define_typed(flag, arg, value.clone(), |text| {
            text.parse::<f64>().map_err(|e| e.to_string())
        });
        value
    }

    fn string(&mut self, name: &str, default: &str, usage: &str) -> Value<String> {
        let value = Value::new(default.to_string());
        let arg = Self::value_arg(name, FlagKind::String, usage)
            .value_parser(clap::value_parser!(String));
        let flag = Flag::new(name, FlagKind::String, default, usage);
        self.define_typed(flag, arg, value.clone(), |text| Ok(text.to_string()));
        value
    }

    fn duration(&mut self, name: &str, default: Duration, usage: &str) -> Value<Duration> {
        let value = Value::new(default);
        let arg = Self::value_arg(name, FlagKind::Duration, usage)
            .value_parser(parse_duration);
        let flag = Flag::new(name, FlagKind::Duration, format_duration(default), usage);
        self.define_typed(flag, arg, value.clone(), parse_duration);
        value
    }

    fn func(&mut self, name: &str, usage: &str, apply: FlagFn) {
        let apply = Rc::new(apply);
        let arg = Self::value_arg(name, FlagKind::Func, usage)
            .value_parser(clap::value_parser!(String))
            .action(ArgAction::Append);

        let id = name.to_string();
        let on_parse = Rc::clone(&apply);
        let bind: Bind = Box::new(move |matches: &ArgMatches| {
            for value in matches.get_many::<String>(&id).into_iter().flatten() {
                on_parse(value.as_str()).map_err(|err| invalid_value(&id, value, format!("{err:#}")))?;
            }
            Ok(())
        });
        let store: Store =
            Box::new(move |text: &str| apply(text).map_err(|err| format!("{err:#}")));

        self.define(Slot {
            flag: Flag::new(name, FlagKind::Func, "", usage),
            arg,
            bind,
            store,
        });
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), FlagError> {
        let Some(slot) = self.slots.iter().find(|slot| slot.flag.name == name) else {
            return Err(self.invalid(format!("no such flag -{name}")));
        };
        (slot.store)(value).map_err(|err| self.invalid(invalid_value(name, value, err)))?;
        self.actual.insert(name.to_string());
        Ok(())
    }

    fn nflag(&self) -> usize {
        self.actual.len()
    }

    fn parse(&mut self, args: &[String]) -> Result<(), FlagError> {
        let tokens = self.normalize(args);
        trace!(flag_set = %self.name, ?tokens, "parsing flags");

        let matches = self
            .command()
            .try_get_matches_from(tokens)
            .map_err(|err| self.translate(err))?;

        let mut given = Vec::new();
        for slot in &self.slots {
            let name = slot.flag.name.as_str();
            if matches.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            (slot.bind)(&matches).map_err(|message| self.invalid(message))?;
            given.push(name.to_string());
        }
        self.actual.extend(given);

        self.positional = matches
            .get_many::<String>(ARGS_ID)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        Ok(())
    }

    fn flags(&self) -> Vec<Flag> {
        let mut flags: Vec<Flag> = self.slots.iter().map(|slot| slot.flag.clone()).collect();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        flags
    }

    fn args(&self) -> &[String] {
        &self.positional
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn flag_set() -> ClapFlagSet {
        ClapFlagSet::new("test", ErrorHandling::Continue)
    }

    #[test]
    fn test_defaults_before_parse() {
        let mut fs = flag_set();
        let port = fs.int("port", 8080, "port");
        let name = fs.string("name", "bob", "name");
        assert_eq!(port.get(), 8080);
        assert_eq!(name.get(), "bob");
    }

    #[test]
    fn test_parse_single_dash_value() {
        let mut fs = flag_set();
        let int = fs.int("int", 0, "int usage");
        fs.parse(&args(&["-int", "5"])).unwrap();
        assert_eq!(int.get(), 5);
        assert_eq!(fs.narg(), 0);
    }

    #[test]
    fn test_parse_equals_and_double_dash() {
        let mut fs = flag_set();
        let name = fs.string("name", "", "name");
        let ratio = fs.float("ratio", 0.0, "ratio");
        fs.parse(&args(&["-name=alice", "--ratio", "0.5"])).unwrap();
        assert_eq!(name.get(), "alice");
        assert_eq!(ratio.get(), 0.5);
    }

    #[test]
    fn test_parse_negative_value() {
        let mut fs = flag_set();
        let int = fs.int("int", 0, "int usage");
        fs.parse(&args(&["-int", "-7"])).unwrap();
        assert_eq!(int.get(), -7);
    }

    #[test]
    fn test_parse_bare_bool() {
        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        fs.parse(&args(&["-v"])).unwrap();
        assert!(verbose.get());
    }

    #[test]
    fn test_parse_bool_with_value() {
        let mut fs = flag_set();
        let dry = fs.bool("dry", true, "dry run");
        fs.parse(&args(&["-dry=false"])).unwrap();
        assert!(!dry.get());
    }

    #[test]
    fn test_bool_does_not_consume_next_token() {
        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        fs.parse(&args(&["-v", "file.txt"])).unwrap();
        assert!(verbose.get());
        assert_eq!(fs.args(), ["file.txt"]);
    }

    #[test]
    fn test_positional_stops_flag_parsing() {
        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        fs.parse(&args(&["one", "-v", "two"])).unwrap();
        assert!(!verbose.get());
        assert_eq!(fs.args(), ["one", "-v", "two"]);
        assert_eq!(fs.arg(1), Some("-v"));
        assert_eq!(fs.arg(3), None);
    }

    #[test]
    fn test_double_dash_terminates_flags() {
        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        fs.parse(&args(&["--", "-v"])).unwrap();
        assert!(!verbose.get());
        assert_eq!(fs.args(), ["-v"]);
    }

    #[test]
    fn test_unknown_flag_is_invalid() {
        let mut fs = flag_set();
        let err = fs.parse(&args(&["-zzz"])).unwrap_err();
        match err {
            FlagError::Invalid { flag_set, message } => {
                assert_eq!(flag_set, "test");
                assert!(message.contains("zzz"), "message: {message}");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_value_is_invalid() {
        let mut fs = flag_set();
        fs.uint("count", 1, "count");
        let err = fs.parse(&args(&["-count", "many"])).unwrap_err();
        assert!(!err.is_help());
    }

    #[test]
    fn test_help_requested() {
        for token in ["-h", "-help", "--help"] {
            let mut fs = flag_set();
            let err = fs.parse(&args(&[token])).unwrap_err();
            assert!(err.is_help(), "{token} should request help");
        }
    }

    #[test]
    fn test_user_defined_help_flag_wins() {
        let mut fs = flag_set();
        let help = fs.bool("help", false, "custom help");
        fs.parse(&args(&["-help"])).unwrap();
        assert!(help.get());
    }

    #[test]
    #[should_panic(expected = "flag redefined: int")]
    fn test_redefined_flag_panics() {
        let mut fs = flag_set();
        fs.int("int", 0, "a");
        fs.int("int", 1, "b");
    }

    #[test]
    #[should_panic(expected = "flag name must not be empty")]
    fn test_empty_flag_name_panics() {
        flag_set().bool("", false, "nothing");
    }

    #[test]
    fn test_flags_sorted_with_metadata() {
        let mut fs = flag_set();
        fs.string("zeta", "z", "last");
        fs.bool("alpha", false, "first");
        let flags = fs.flags();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0], Flag::new("alpha", FlagKind::Bool, "false", "first"));
        assert_eq!(flags[1], Flag::new("zeta", FlagKind::String, "z", "last"));
    }

    #[test]
    fn test_defaults_listing() {
        let mut fs = flag_set();
        fs.int("int", 0, "int usage");
        assert_eq!(fs.defaults(), "  -int int\n    \tint usage\n");
    }

    #[test]
    fn test_boxed_factory() {
        let fs = ClapFlagSet::boxed("serve", ErrorHandling::Exit);
        assert_eq!(fs.name(), "serve");
        assert_eq!(fs.error_handling(), ErrorHandling::Exit);
        assert!(fs.flags().is_empty());
    }

    #[test]
    fn test_repeated_flag_keeps_last_value() {
        let mut fs = flag_set();
        let int = fs.int("int", 0, "int usage");
        fs.parse(&args(&["-int", "1", "-int", "2"])).unwrap();
        assert_eq!(int.get(), 2);
    }

    #[test]
    fn test_repeated_bool_flag() {
        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        fs.parse(&args(&["-v", "-v"])).unwrap();
        assert!(verbose.get());

        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        fs.parse(&args(&["-v", "-v=false"])).unwrap();
        assert!(!verbose.get());
    }

    #[test]
    fn test_help_spellings_are_independent() {
        let mut fs = flag_set();
        let host = fs.string("h", "", "host");
        assert!(fs.parse(&args(&["-help"])).unwrap_err().is_help());
        assert_eq!(host.get(), "");

        let mut fs = flag_set();
        let host = fs.string("h", "", "host");
        fs.parse(&args(&["-h", "example.org"])).unwrap();
        assert_eq!(host.get(), "example.org");

        let mut fs = flag_set();
        fs.bool("help", false, "custom help");
        assert!(fs.parse(&args(&["-h"])).unwrap_err().is_help());
    }

    #[test]
    fn test_duration_flag() {
        let mut fs = flag_set();
        let timeout = fs.duration("timeout", Duration::from_secs(90), "timeout");
        assert_eq!(timeout.get(), Duration::from_secs(90));
        assert_eq!(fs.lookup("timeout").unwrap().default, "1m30s");

        fs.parse(&args(&["-timeout", "1.5s"])).unwrap();
        assert_eq!(timeout.get(), Duration::from_millis(1500));
    }

    #[test]
    fn test_duration_flag_rejects_bad_value() {
        let mut fs = flag_set();
        fs.duration("timeout", Duration::ZERO, "timeout");
        let err = fs.parse(&args(&["-timeout=soon"])).unwrap_err();
        assert!(!err.is_help());
        assert!(err.to_string().contains("soon"), "error: {err}");
    }

    #[test]
    fn test_func_flag_sees_every_occurrence() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut fs = flag_set();
        fs.func(
            "tag",
            "add a tag",
            Box::new(move |value| {
                sink.borrow_mut().push(value.to_string());
                Ok(())
            }),
        );
        fs.parse(&args(&["-tag", "a", "-tag=b", "rest"])).unwrap();

        assert_eq!(*seen.borrow(), ["a", "b"]);
        assert_eq!(fs.args(), ["rest"]);
        assert_eq!(fs.defaults(), "  -tag value\n    \tadd a tag\n");
    }

    #[test]
    fn test_func_flag_error_fails_parse() {
        let mut fs = flag_set();
        fs.func(
            "level",
            "log level",
            Box::new(|value| match value {
                "debug" | "info" => Ok(()),
                other => anyhow::bail!("unknown level {other}"),
            }),
        );
        let err = fs.parse(&args(&["-level", "loud"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "test: invalid value \"loud\" for flag -level: unknown level loud"
        );
    }

    #[test]
    fn test_lookup() {
        let mut fs = flag_set();
        fs.uint("count", 3, "repeat count");
        assert_eq!(
            fs.lookup("count"),
            Some(Flag::new("count", FlagKind::Uint, "3", "repeat count"))
        );
        assert_eq!(fs.lookup("missing"), None);
    }

    #[test]
    fn test_set_and_nflag() {
        let mut fs = flag_set();
        let verbose = fs.bool("v", false, "verbose");
        let count = fs.uint("count", 1, "count");
        let name = fs.string("name", "", "name");
        assert_eq!(fs.nflag(), 0);

        fs.set("count", "7").unwrap();
        assert_eq!(count.get(), 7);
        assert_eq!(fs.nflag(), 1);

        fs.parse(&args(&["-v", "-count", "7"])).unwrap();
        assert!(verbose.get());
        assert_eq!(name.get(), "");
        assert_eq!(fs.nflag(), 2);
    }

    #[test]
    fn test_set_keeps_value_when_not_on_command_line() {
        let mut fs = flag_set();
        let name = fs.string("name", "bob", "name");
        fs.set("name", "alice").unwrap();
        fs.parse(&args(&["x"])).unwrap();
        assert_eq!(name.get(), "alice");
    }

    #[test]
    fn test_set_errors() {
        let mut fs = flag_set();
        fs.int("int", 0, "int usage");
        fs.bool("v", false, "verbose");

        let err = fs.set("missing", "1").unwrap_err();
        assert_eq!(err.to_string(), "test: no such flag -missing");

        let err = fs.set("int", "x").unwrap_err();
        assert!(err.to_string().starts_with("test: invalid value \"x\" for flag -int"));

        assert!(fs.set("v", "maybe").is_err());
        fs.set("v", "yes").unwrap();
        assert_eq!(fs.nflag(), 1);
    }
}
