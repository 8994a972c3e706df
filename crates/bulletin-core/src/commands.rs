use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail};
use tracing::{debug, instrument};

use crate::api::Transport;
use crate::cli::{Command, FormFields};
use crate::config::Config;
use crate::controller::Prompter;
use crate::controls::{ControlKind, parse_message_id};
use crate::form::FormEdits;
use crate::render::TemplateRenderer;
use crate::runtime::Runtime;

/// Terminal confirm/alert. Confirmations are read from stdin unless
/// `assume_yes` is set.
#[derive(Debug)]
pub struct StdPrompter<I, E> {
    input: I,
    err: E,
    assume_yes: bool,
    alerts: usize,
}

impl StdPrompter<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio(assume_yes: bool) -> Self {
        Self::new(io::stdin().lock(), io::stderr(), assume_yes)
    }
}

impl<I: BufRead, E: Write> StdPrompter<I, E> {
    pub fn new(input: I, err: E, assume_yes: bool) -> Self {
        Self {
            input,
            err,
            assume_yes,
            alerts: 0,
        }
    }

    /// Alerts raised so far.
    pub fn alerts(&self) -> usize {
        self.alerts
    }
}

impl<I: BufRead, E: Write> Prompter for StdPrompter<I, E> {
    fn confirm(&mut self, question: &str) -> bool {
        if self.assume_yes {
            debug!(question, "confirmation assumed");
            return true;
        }
        if write!(self.err, "{question} [y/N] ").is_err() || self.err.flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if self.input.read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn alert(&mut self, text: &str) {
        self.alerts += 1;
        // Nothing else to report to if stderr is gone.
        let _ = writeln!(self.err, "{text}");
    }
}

/// Runs one subcommand. No subcommand means `list`.
#[instrument(skip(runtime, cfg, command))]
pub fn dispatch<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    cfg: &Config,
    command: Option<Command>,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    let command = command.unwrap_or(Command::List);
    debug!(?command, "dispatching command");

    match command {
        Command::List => cmd_list(runtime),
        Command::Show { id } => cmd_show(runtime, &id),
        Command::Add { fields, dry_run } => cmd_add(runtime, &fields, dry_run),
        Command::Edit {
            id,
            fields,
            clear_begins,
            clear_expires,
            dry_run,
        } => {
            let mut edits = fields.to_edits();
            if clear_begins {
                edits.begins = Some(String::new());
            }
            if clear_expires {
                edits.expires = Some(String::new());
            }
            cmd_edit(runtime, &id, &edits, dry_run)
        }
        Command::Publish { id } => cmd_toggle(runtime, ControlKind::Publish, &id),
        Command::Unpublish { id } => cmd_toggle(runtime, ControlKind::Unpublish, &id),
        Command::Delete { id } => cmd_delete(runtime, &id),
        Command::Tags => cmd_tags(runtime),
        Command::Activate { control } => cmd_activate(runtime, &control),
        Command::Config => cmd_config(cfg),
    }
}

fn require_id(raw: &str) -> anyhow::Result<u64> {
    parse_message_id(raw).ok_or_else(|| anyhow!("invalid message id: {raw}"))
}

fn ensure_no_alerts<T, R, I, E, W>(
    runtime: &Runtime<T, R, StdPrompter<I, E>, W>,
    before: usize,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    if runtime.prompter().alerts() > before {
        bail!("action failed");
    }
    Ok(())
}

fn cmd_list<T, R, I, E, W>(runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    runtime.show_list()?;
    runtime.ensure_not_failed()
}

fn cmd_show<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    id: &str,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    require_id(id)?;
    runtime.show_edit_form(id)?;
    runtime.ensure_not_failed()
}

fn cmd_add<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    fields: &FormFields,
    dry_run: bool,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    runtime.set_muted(true);
    runtime.show_add_form()?;
    runtime.ensure_not_failed()?;
    fill_and_submit(runtime, &fields.to_edits(), dry_run)
}

fn cmd_edit<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    id: &str,
    edits: &FormEdits,
    dry_run: bool,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    require_id(id)?;
    if edits.is_empty() && !dry_run {
        bail!("nothing to change for message {id}");
    }
    runtime.set_muted(true);
    runtime.show_edit_form(id)?;
    runtime.ensure_not_failed()?;
    fill_and_submit(runtime, edits, dry_run)
}

fn fill_and_submit<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    edits: &FormEdits,
    dry_run: bool,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    runtime.set_muted(!dry_run);
    runtime.update_form(edits)?;
    if dry_run {
        return Ok(());
    }

    runtime.set_muted(false);
    runtime.submit()?;
    runtime.ensure_not_failed()?;
    if let Some(error) = runtime.controller().form_error() {
        bail!("message not saved: {error}");
    }
    Ok(())
}

fn cmd_toggle<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    kind: ControlKind,
    id: &str,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    require_id(id)?;
    // The toggle reads the message's current window from the list.
    runtime.set_muted(true);
    runtime.show_list()?;
    runtime.ensure_not_failed()?;
    runtime.set_muted(false);

    let before = runtime.prompter().alerts();
    runtime.toggle_publish(kind, id)?;
    runtime.ensure_not_failed()?;
    ensure_no_alerts(runtime, before)
}

fn cmd_delete<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    id: &str,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    require_id(id)?;
    let before = runtime.prompter().alerts();
    runtime.delete(id)?;
    runtime.ensure_not_failed()?;
    ensure_no_alerts(runtime, before)
}

fn cmd_activate<T, R, I, E, W>(
    runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>,
    control: &str,
) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    runtime.set_muted(true);
    runtime.show_list()?;
    runtime.ensure_not_failed()?;
    runtime.set_muted(false);

    let before = runtime.prompter().alerts();
    runtime.activate(control)?;
    runtime.ensure_not_failed()?;
    ensure_no_alerts(runtime, before)
}

fn cmd_tags<T, R, I, E, W>(runtime: &mut Runtime<T, R, StdPrompter<I, E>, W>) -> anyhow::Result<()>
where
    T: Transport,
    R: TemplateRenderer,
    I: BufRead,
    E: Write,
    W: Write,
{
    runtime.refresh_tags()?;
    runtime.ensure_not_failed()?;
    for group in runtime.controller().tags().groups() {
        let names = group
            .tags
            .iter()
            .map(|tag| tag.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}: {names}", group.name);
    }
    Ok(())
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    for path in &cfg.loaded_files {
        debug!(rc = %path.display(), "loaded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_reads_yes_from_input() {
        let mut err = Vec::new();
        let mut prompter = StdPrompter::new("yes\n".as_bytes(), &mut err, false);
        assert!(prompter.confirm("Delete this message?"));
        let mut prompter = StdPrompter::new("\n".as_bytes(), &mut err, false);
        assert!(!prompter.confirm("Delete this message?"));
        let text = String::from_utf8(err).expect("utf8");
        assert!(text.starts_with("Delete this message? [y/N] "));
    }

    #[test]
    fn assume_yes_skips_input() {
        let mut prompter = StdPrompter::new(io::empty(), io::sink(), true);
        assert!(prompter.confirm("Publish this message?"));
        prompter.alert("Publish failed: nope");
        assert_eq!(prompter.alerts(), 1);
    }

    #[test]
    fn ids_must_be_digits() {
        assert_eq!(require_id("12").expect("id"), 12);
        assert!(require_id("12a").is_err());
    }
}
