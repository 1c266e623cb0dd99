//! Subcommand dispatch for name-value flag parsers.
//!
//! `cmdopt` lets a program register named subcommands, each with its own flag
//! set, title and usage text, and then routes the process arguments to the
//! right one. It supports exactly one level of subcommands plus a top-level
//! handler.
//!
//! # Features
//!
//! - **Registry**: unique names, sorted listing, per-command usage
//! - **Routing**: `-flag` first means top level, anything else is a command name
//! - **Usage templates**: `{{flags}}` and `{{commands}}` placeholders
//! - **Help subcommand**: optional, queries the registry
//! - **Pluggable flag parsing**: the [`FlagSet`] trait, with a clap-backed
//!   [`ClapFlagSet`] by default
//!
//! # Example
//!
//! ```rust
//! use std::io::Write;
//! use cmdopt::{handler, Dispatcher};
//!
//! let mut opt = Dispatcher::builder(Vec::new())
//!     .usage("usage: app <command>\n\ncommands:\n{{commands}}")
//!     .not_found(|name| format!("unknown command: {name}\n"))
//!     .build();
//!
//! opt.command("build", "compile the project", "usage: app build [flags]\n{{flags}}", |fs| {
//!     let release = fs.bool("release", false, "optimized build");
//!     handler(move |ctx| {
//!         writeln!(ctx, "release={}", release.get())?;
//!         Ok(())
//!     })
//! });
//! opt.help("help", "show help", "usage: app help [command]");
//!
//! opt.exec(["build", "-release"]).unwrap();
//! assert_eq!(opt.output(), b"release=true\n");
//! ```
//!
//! # Errors
//!
//! Misuse of the API is a bug in the calling program and panics: duplicate or
//! empty names, empty usage, a placeholder on the first usage line, calling
//! [`Dispatcher::exec`] twice. Parse failures and handler failures are
//! returned as [`Error`].

mod clap_flags;
mod dispatch;
mod duration;
mod error;
mod flags;
mod help;
mod registry;
pub mod usage;

pub use clap_flags::ClapFlagSet;

pub use dispatch::{handler, Context, Dispatcher, DispatcherBuilder, State};

pub use duration::{format_duration, parse_duration};

pub use error::{Error, FlagError};

pub use flags::{render_defaults, ErrorHandling, Flag, FlagFn, FlagKind, FlagSet, Value};

pub use usage::{COMMANDS_PLACEHOLDER, FLAGS_PLACEHOLDER};
