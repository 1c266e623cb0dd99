//! The `help` subcommand.

use std::io::Write;

use crate::dispatch::{handler, Dispatcher};

impl<W: Write> Dispatcher<W> {
    /// Registers a help subcommand called `name`.
    ///
    /// - `name` alone prints the full usage.
    /// - `name <command>` prints that command's usage.
    /// - `name <unknown>` prints the not-found text for it.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`Dispatcher::command`].
    pub fn help(&mut self, name: &str, title: &str, usage: &str) -> &mut Self {
        self.command(name, title, usage, |_| {
            handler(|ctx| {
                let text = match ctx.arg(0) {
                    None => ctx.usage(),
                    Some(target) => match ctx.command(target) {
                        Some((_, usage)) => usage.to_string(),
                        None => ctx.not_found(target),
                    },
                };
                ctx.write_all(text.as_bytes())?;
                Ok(())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::dispatch::{handler, Dispatcher};
    use std::io::Write;

    fn dispatcher() -> Dispatcher<Vec<u8>> {
        let mut opt = Dispatcher::builder(Vec::new())
            .usage("usage\n{{commands}}")
            .not_found(|name| format!("not found {name}\n"))
            .build();
        opt.command("t1", "test1", "t1 usage\n{{flags}}", |fs| {
            fs.bool("v", false, "verbose");
            handler(|ctx| {
                ctx.write_all(b"t1")?;
                Ok(())
            })
        });
        opt.help("h", "show help", "h usage");
        opt
    }

    fn run(args: &[&str]) -> String {
        let mut opt = dispatcher();
        opt.exec(args.iter().copied()).unwrap();
        String::from_utf8(opt.into_output()).unwrap()
    }

    #[test]
    fn test_help_without_args_prints_usage() {
        assert_eq!(run(&["h"]), "usage\n  h    show help\n  t1   test1\n\n");
    }

    #[test]
    fn test_help_for_command() {
        assert_eq!(run(&["h", "t1"]), "t1 usage\n  -v\tverbose\n");
    }

    #[test]
    fn test_help_for_itself() {
        assert_eq!(run(&["h", "h"]), "h usage\n");
    }

    #[test]
    fn test_help_for_unknown() {
        assert_eq!(run(&["h", "not-exists"]), "not found not-exists\n");
        assert_eq!(run(&["h", ""]), "not found \n");
    }
}
