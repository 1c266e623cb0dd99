//! Command registry.
//!
//! Holds every registered subcommand with its title, rendered usage and flag
//! set, together with the top-level flag set and usage template needed to
//! render the full help screen.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use crate::dispatch::Handler;
use crate::flags::FlagSet;
use crate::usage::{self, first_line_has_placeholder, FLAGS_PLACEHOLDER};

/// Formats the message for an unknown subcommand name.
pub(crate) type NotFoundFn = Box<dyn Fn(&str) -> String>;

/// A registered subcommand.
pub(crate) struct Command {
    pub(crate) title: String,
    pub(crate) usage: String,
    /// Parsed in place by the one and only dispatch.
    pub(crate) flags: RefCell<Box<dyn FlagSet>>,
    /// Taken by the one and only dispatch.
    pub(crate) handler: Cell<Option<Handler>>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("title", &self.title)
            .field("usage", &self.usage)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

pub(crate) struct Catalog {
    commands: HashMap<String, Command>,
    template: String,
    top: Box<dyn FlagSet>,
    max_name_len: usize,
    not_found: Option<NotFoundFn>,
}

impl Catalog {
    pub(crate) fn new(
        template: String,
        top: Box<dyn FlagSet>,
        not_found: Option<NotFoundFn>,
    ) -> Self {
        Self {
            commands: HashMap::new(),
            template,
            top,
            max_name_len: 0,
            not_found,
        }
    }

    /// Panics unless `name` and `usage` may be registered.
    pub(crate) fn check_new(&self, name: &str, usage: &str) {
        if name.is_empty() {
            panic!("command name must not be empty");
        }
        if name.starts_with('-') {
            panic!("command name must not start with '-': {name}");
        }
        if usage.is_empty() {
            panic!("usage of command {name} must not be empty");
        }
        if first_line_has_placeholder(usage) {
            panic!("first line of the usage of command {name} must not contain a placeholder");
        }
        if self.commands.contains_key(name) {
            panic!("duplicate command name: {name}");
        }
    }

    /// Stores a command, rendering `{{flags}}` in its usage from `flags`.
    pub(crate) fn insert(
        &mut self,
        name: &str,
        title: &str,
        usage: &str,
        flags: Box<dyn FlagSet>,
        handler: Handler,
    ) {
        self.check_new(name, usage);

        let usage = if usage.contains(FLAGS_PLACEHOLDER) {
            usage.replace(FLAGS_PLACEHOLDER, &flags.defaults())
        } else {
            usage.to_string()
        };
        let usage = if usage.ends_with('\n') {
            usage
        } else {
            usage + "\n"
        };

        self.max_name_len = self.max_name_len.max(name.len());
        self.commands.insert(
            name.to_string(),
            Command {
                title: title.to_string(),
                usage,
                flags: RefCell::new(flags),
                handler: Cell::new(Some(handler)),
            },
        );
    }

    /// Registered names in lexicographic order.
    pub(crate) fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Title and usage of `name`.
    pub(crate) fn lookup(&self, name: &str) -> Option<(&str, &str)> {
        self.commands
            .get(name)
            .map(|cmd| (cmd.title.as_str(), cmd.usage.as_str()))
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub(crate) fn top(&self) -> &dyn FlagSet {
        self.top.as_ref()
    }

    pub(crate) fn top_mut(&mut self) -> &mut dyn FlagSet {
        self.top.as_mut()
    }

    pub(crate) fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Renders the top-level usage template.
    pub(crate) fn usage(&self) -> String {
        let entries = self.commands().into_iter().map(|name| {
            let title = self.commands[name].title.as_str();
            (name, title)
        });
        let commands = usage::commands_block(entries, self.max_name_len());
        usage::render(&self.template, &self.top.defaults(), &commands)
    }

    /// Text shown for an unknown subcommand name.
    ///
    /// Falls back to the full usage when no formatter is configured.
    pub(crate) fn not_found(&self, name: &str) -> String {
        match &self.not_found {
            Some(format) => format(name),
            None => self.usage(),
        }
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("commands", &self.commands())
            .field("template", &self.template)
            .field("max_name_len", &self.max_name_len)
            .field("not_found", &self.not_found.is_some())
            .finish_non_exhaustive()
    }
}
