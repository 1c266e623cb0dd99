//! A small CLI built on cmdopt.
//!
//! ```text
//! cmdopt-demo                      # usage
//! cmdopt-demo -version             # top-level flag
//! cmdopt-demo greet -name=bob -shout
//! cmdopt-demo sum -scale 2 1 2 3
//! cmdopt-demo help greet
//! ```
//!
//! Set `RUST_LOG=debug` to see routing decisions on stderr.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context as _;
use cmdopt::{handler, Dispatcher, Error, ErrorHandling};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: cmdopt-demo [flags] <command> [args]

flags:
{{flags}}
commands:
{{commands}}
Run 'cmdopt-demo help <command>' for details on a command.";

const GREET_USAGE: &str = "\
usage: cmdopt-demo greet [flags]

Prints a greeting.

flags:
{{flags}}";

const SUM_USAGE: &str = "\
usage: cmdopt-demo sum [flags] <number>...

Adds the numbers given as arguments.

flags:
{{flags}}";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore error if a subscriber is already set.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build<W: Write>(output: W) -> Dispatcher<W> {
    let mut opt = Dispatcher::builder(output)
        .error_handling(ErrorHandling::Continue)
        .usage(USAGE)
        .top_level(|fs| {
            let version = fs.bool("version", false, "print the version and exit");
            handler(move |ctx| {
                if version.get() {
                    writeln!(ctx, "cmdopt-demo {}", env!("CARGO_PKG_VERSION"))?;
                } else {
                    let usage = ctx.usage();
                    ctx.write_all(usage.as_bytes())?;
                }
                Ok(())
            })
        })
        .not_found(|name| {
            format!("cmdopt-demo: unknown command {name:?}\nRun 'cmdopt-demo help' for usage.\n")
        })
        .build();

    opt.command("greet", "print a greeting", GREET_USAGE, |fs| {
        let name = fs.string("name", "world", "who to greet");
        let shout = fs.bool("shout", false, "use upper case");
        handler(move |ctx| {
            let mut line = format!("hello, {}!", name.get());
            if shout.get() {
                line = line.to_uppercase();
            }
            writeln!(ctx, "{line}")?;
            Ok(())
        })
    });

    opt.command("sum", "add numbers", SUM_USAGE, |fs| {
        let scale = fs.float("scale", 1.0, "multiply the total by this factor");
        handler(move |ctx| {
            let mut total = 0.0;
            for arg in ctx.args() {
                let n: f64 = arg
                    .parse()
                    .with_context(|| format!("not a number: {arg:?}"))?;
                total += n;
            }
            let total = total * scale.get();
            writeln!(ctx, "{total}")?;
            Ok(())
        })
    });

    opt.help("help", "show help for a command", "usage: cmdopt-demo help [command]");
    opt
}

/// Converts raw process arguments, replacing invalid UTF-8 with U+FFFD.
fn cli_args(raw: impl IntoIterator<Item = OsString>) -> Vec<String> {
    raw.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

fn main() -> ExitCode {
    init_logging();

    let mut opt = build(io::stdout());
    debug!(commands = ?opt.commands(), "dispatching");
    match opt.exec(cli_args(std::env::args_os().skip(1))) {
        Ok(()) => ExitCode::SUCCESS,
        // Already reported together with the usage.
        Err(Error::Flags(err)) if err.is_help() => ExitCode::SUCCESS,
        Err(Error::Flags(_)) => ExitCode::from(2),
        Err(err) => {
            eprintln!("cmdopt-demo: {err:#}");
            ExitCode::FAILURE
        }
    }
}
