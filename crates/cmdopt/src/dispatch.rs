//! Command routing.
//!
//! A [`Dispatcher`] routes one argument vector (program name excluded) to
//! exactly one place:
//!
//! ```text
//! []                  → top-level handler, no parsing
//! ["-x", ...]         → top-level flags parsed, then top-level handler
//! ["name", ...]       → name's flags parsed from the rest, then name's handler
//! ["unknown", ...]    → not-found text (or the full usage)
//! ```
//!
//! A name can never start with `-`, so a single look at the first character of
//! the first argument tells flags and command names apart.
//!
//! # One shot
//!
//! [`Dispatcher::exec`] may be called once. Handlers are consumed and flag
//! values are already bound after the first call, so a second call panics.
//! The check is not synchronized; a dispatcher is meant to be driven from a
//! single thread (it is `!Send` anyway).

use std::io::{self, Write};

use tracing::{debug, trace};

use crate::clap_flags::ClapFlagSet;
use crate::error::{Error, FlagError};
use crate::flags::{ErrorHandling, FlagSet};
use crate::registry::{Catalog, NotFoundFn};

/// A boxed handler, run after its flags are parsed.
pub(crate) type Handler = Box<dyn FnOnce(&mut Context<'_>) -> anyhow::Result<()>>;

type HandlerBuilder = Box<dyn FnOnce(&mut dyn FlagSet) -> Handler>;

type FlagSetFactory = Box<dyn Fn(&str, ErrorHandling) -> Box<dyn FlagSet>>;

/// Pins a closure to the handler signature.
///
/// Closures returned from a builder cannot infer their argument type on their
/// own; wrapping them here does it:
///
/// ```rust
/// use std::io::Write;
/// use cmdopt::{handler, Dispatcher};
///
/// let mut opt = Dispatcher::builder(Vec::new()).usage("{{commands}}").build();
/// opt.command("greet", "say hello", "usage: greet [-name string]\n{{flags}}", |fs| {
///     let name = fs.string("name", "world", "who to greet");
///     handler(move |ctx| {
///         write!(ctx, "hello {}", name.get())?;
///         Ok(())
///     })
/// });
///
/// opt.exec(["greet", "-name", "bob"]).unwrap();
/// assert_eq!(opt.output(), b"hello bob");
/// ```
pub fn handler<F>(f: F) -> F
where
    F: FnOnce(&mut Context<'_>) -> anyhow::Result<()>,
{
    f
}

/// Lifecycle of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Commands may be registered; `exec` has not run.
    Idle,
    /// `exec` has run. Terminal.
    Executed,
}

/// What a handler sees while it runs.
///
/// Gives access to the positional arguments left by flag parsing, the output
/// sink (through [`Write`]) and read-only queries on the dispatcher.
pub struct Context<'a> {
    catalog: &'a Catalog,
    flags: &'a dyn FlagSet,
    output: &'a mut dyn Write,
}

impl<'a> Context<'a> {
    /// Positional arguments.
    pub fn args(&self) -> &[String] {
        self.flags.args()
    }

    /// The `i`th positional argument.
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.flags.arg(i)
    }

    /// Number of positional arguments.
    pub fn narg(&self) -> usize {
        self.flags.narg()
    }

    /// The flag set that was parsed for this handler.
    pub fn flags(&self) -> &dyn FlagSet {
        self.flags
    }

    /// The output sink.
    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    /// The rendered top-level usage.
    pub fn usage(&self) -> String {
        self.catalog.usage()
    }

    /// Title and usage of a registered command.
    pub fn command(&self, name: &str) -> Option<(&str, &str)> {
        self.catalog.lookup(name)
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        self.catalog.commands()
    }

    /// Text shown for an unknown command name.
    pub fn not_found(&self, name: &str) -> String {
        self.catalog.not_found(name)
    }
}

impl Write for Context<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder<W> {
    output: W,
    error_handling: ErrorHandling,
    usage: String,
    top_level: Option<HandlerBuilder>,
    not_found: Option<NotFoundFn>,
    flag_sets: Option<FlagSetFactory>,
}

impl<W: Write> DispatcherBuilder<W> {
    fn new(output: W) -> Self {
        Self {
            output,
            error_handling: ErrorHandling::default(),
            usage: String::new(),
            top_level: None,
            not_found: None,
            flag_sets: None,
        }
    }

    /// Policy handed to every flag set the dispatcher creates.
    pub fn error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    /// Top-level usage template. See [`usage`](crate::usage) for placeholders.
    pub fn usage(mut self, template: impl Into<String>) -> Self {
        self.usage = template.into();
        self
    }

    /// Handler used when no command name is given.
    ///
    /// `build` receives the top-level flag set. Without one, the top level
    /// prints the usage.
    pub fn top_level<B, H>(mut self, build: B) -> Self
    where
        B: FnOnce(&mut dyn FlagSet) -> H + 'static,
        H: FnOnce(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    {
        self.top_level = Some(Box::new(move |fs: &mut dyn FlagSet| -> Handler {
            Box::new(build(fs))
        }));
        self
    }

    /// Formats the message for an unknown command name.
    ///
    /// Without one, the full usage is printed.
    pub fn not_found<F>(mut self, format: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.not_found = Some(Box::new(format));
        self
    }

    /// Replaces the [`FlagSet`] implementation.
    ///
    /// The factory gets the set name (empty for the top level) and the
    /// error-handling policy.
    pub fn flag_sets<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str, ErrorHandling) -> Box<dyn FlagSet> + 'static,
    {
        self.flag_sets = Some(Box::new(factory));
        self
    }

    pub fn build(self) -> Dispatcher<W> {
        let flag_sets = self
            .flag_sets
            .unwrap_or_else(|| Box::new(ClapFlagSet::boxed) as FlagSetFactory);

        let mut top = flag_sets("", self.error_handling);
        let top_level = self.top_level.map(|build| build(top.as_mut()));

        Dispatcher {
            output: self.output,
            catalog: Catalog::new(self.usage, top, self.not_found),
            top_level,
            error_handling: self.error_handling,
            flag_sets,
            state: State::Idle,
        }
    }
}

/// Routes an argument vector to a registered command.
pub struct Dispatcher<W: Write = io::Stdout> {
    output: W,
    catalog: Catalog,
    top_level: Option<Handler>,
    error_handling: ErrorHandling,
    flag_sets: FlagSetFactory,
    state: State,
}

impl<W: Write> Dispatcher<W> {
    /// Starts building a dispatcher writing to `output`.
    pub fn builder(output: W) -> DispatcherBuilder<W> {
        DispatcherBuilder::new(output)
    }

    /// Registers a subcommand.
    ///
    /// `build` runs right away with a fresh flag set named `name`; it binds
    /// the command's flags and returns the handler. `{{flags}}` in `usage` is
    /// replaced by that flag set's defaults listing.
    ///
    /// # Panics
    ///
    /// If `name` is empty, starts with `-` or is already registered, if
    /// `usage` is empty or has a placeholder on its first line, or if the
    /// dispatcher has already executed.
    pub fn command<B, H>(&mut self, name: &str, title: &str, usage: &str, build: B) -> &mut Self
    where
        B: FnOnce(&mut dyn FlagSet) -> H,
        H: FnOnce(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    {
        if self.state == State::Executed {
            panic!("cannot register command {name} after exec");
        }
        self.catalog.check_new(name, usage);

        let mut flags = (self.flag_sets)(name, self.error_handling);
        let handler: Handler = Box::new(build(flags.as_mut()));
        self.catalog.insert(name, title, usage, flags, handler);

        debug!(command = name, "registered command");
        self
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        self.catalog.commands()
    }

    /// Title and usage of a registered command.
    pub fn command_info(&self, name: &str) -> Option<(&str, &str)> {
        self.catalog.lookup(name)
    }

    /// The rendered top-level usage.
    pub fn usage(&self) -> String {
        self.catalog.usage()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Routes `args` (without the program name).
    ///
    /// Returns parse errors (after reporting them to the output) and handler
    /// errors. An unknown command name is not an error.
    ///
    /// # Panics
    ///
    /// On a second call.
    pub fn exec<I, S>(&mut self, args: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.state == State::Executed {
            panic!("exec may only be called once per dispatcher");
        }
        self.state = State::Executed;

        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        trace!(?args, "exec");

        let Some((first, rest)) = args.split_first() else {
            debug!("no arguments, running top-level handler");
            return self.run_top_level();
        };

        if first.starts_with('-') {
            debug!("arguments start with a flag, parsing top-level flags");
            if let Err(err) = self.catalog.top_mut().parse(&args) {
                let usage = self.catalog.usage();
                let policy = self.catalog.top().error_handling();
                return match self.report(err, policy, &usage) {
                    Error::Flags(FlagError::Help) => Ok(()),
                    other => Err(other),
                };
            }
            return self.run_top_level();
        }

        let Some(cmd) = self.catalog.get(first) else {
            debug!(command = %first, "unknown command");
            let text = self.catalog.not_found(first);
            self.output.write_all(text.as_bytes())?;
            return Ok(());
        };

        debug!(command = %first, "dispatching to command");
        let parsed = cmd.flags.borrow_mut().parse(rest);
        if let Err(err) = parsed {
            let usage = cmd.usage.clone();
            let policy = cmd.flags.borrow().error_handling();
            return Err(self.report(err, policy, &usage));
        }

        let Some(handler) = cmd.handler.take() else {
            panic!("handler of command {first} already ran");
        };
        let flags = cmd.flags.borrow();
        run(&self.catalog, &**flags, &mut self.output, handler)
    }

    fn run_top_level(&mut self) -> Result<(), Error> {
        match self.top_level.take() {
            Some(handler) => run(&self.catalog, self.catalog.top(), &mut self.output, handler),
            None => {
                let usage = self.catalog.usage();
                self.output.write_all(usage.as_bytes())?;
                Ok(())
            }
        }
    }

    /// Writes a parse failure to the output and applies `policy`.
    ///
    /// Help requests print the usage; other errors print the message first.
    /// Returns the error to hand back under [`ErrorHandling::Continue`].
    fn report(&mut self, err: FlagError, policy: ErrorHandling, usage: &str) -> Error {
        let written = if err.is_help() {
            self.output.write_all(usage.as_bytes())
        } else {
            writeln!(self.output, "{err}").and_then(|()| self.output.write_all(usage.as_bytes()))
        };
        if let Err(io) = written {
            return Error::Output(io);
        }

        match policy {
            ErrorHandling::Continue => Error::Flags(err),
            ErrorHandling::Exit => {
                let _ = self.output.flush();
                std::process::exit(if err.is_help() { 0 } else { 2 });
            }
            ErrorHandling::Panic => panic!("{err}"),
        }
    }
}

impl<W: Write> std::fmt::Debug for Dispatcher<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("catalog", &self.catalog)
            .field("error_handling", &self.error_handling)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn run(
    catalog: &Catalog,
    flags: &dyn FlagSet,
    output: &mut dyn Write,
    handler: Handler,
) -> Result<(), Error> {
    let mut ctx = Context {
        catalog,
        flags,
        output,
    };
    handler(&mut ctx).map_err(Error::Handler)
}
