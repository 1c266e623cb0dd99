//! Usage text templating.
//!
//! Templates are plain strings with two recognized placeholders:
//!
//! - `{{flags}}`: the flag defaults listing of a [`FlagSet`](crate::FlagSet)
//! - `{{commands}}`: the aligned list of registered subcommands
//!
//! Matching is literal and case-sensitive. There is no escaping, no
//! conditionals and no other syntax.

/// Replaced by the flag defaults listing.
pub const FLAGS_PLACEHOLDER: &str = "{{flags}}";

/// Replaced by the subcommand list.
pub const COMMANDS_PLACEHOLDER: &str = "{{commands}}";

/// Spaces between the longest command name and its title.
pub(crate) const NAME_GUTTER: usize = 3;

/// Indentation of each command line.
const INDENT: &str = "  ";

/// Substitutes both placeholders in a single pass.
///
/// Substituted text is never scanned again, so a flag usage that happens to
/// contain `{{commands}}` stays as written. The result always ends with a
/// newline.
pub fn render(template: &str, flags: &str, commands: &str) -> String {
    let mut out = String::with_capacity(template.len() + flags.len() + commands.len() + 1);
    let mut rest = template;

    loop {
        let next = [
            (rest.find(FLAGS_PLACEHOLDER), FLAGS_PLACEHOLDER, flags),
            (rest.find(COMMANDS_PLACEHOLDER), COMMANDS_PLACEHOLDER, commands),
        ]
        .into_iter()
        .filter_map(|(pos, token, text)| pos.map(|p| (p, token, text)))
        .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, token, text)) => {
                out.push_str(&rest[..pos]);
                out.push_str(text);
                rest = &rest[pos + token.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }

    if !template.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Formats the `{{commands}}` block.
///
/// Each entry becomes `"  " + name + padding + title`, where names are padded
/// to `max_name_len` plus a fixed gutter. Entries are written in the order
/// given; callers pass them sorted.
pub fn commands_block<'a, I>(entries: I, max_name_len: usize) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let width = max_name_len + NAME_GUTTER;
    let mut out = String::new();
    for (name, title) in entries {
        out.push_str(INDENT);
        out.push_str(name);
        out.push_str(&" ".repeat(width.saturating_sub(name.len())));
        out.push_str(title);
        out.push('\n');
    }
    out
}

/// Returns true if the first line of `usage` contains a placeholder.
pub(crate) fn first_line_has_placeholder(usage: &str) -> bool {
    let first = usage.lines().next().unwrap_or_default();
    first.contains(FLAGS_PLACEHOLDER) || first.contains(COMMANDS_PLACEHOLDER)
}
