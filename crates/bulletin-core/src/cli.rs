use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::form::FormEdits;
use crate::message::Level;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bulletin",
    version,
    about = "Bulletin: manage announcement messages through the message API",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "bulletinrc", global = true)]
    pub bulletinrc: Option<PathBuf>,

    /// Answer yes to every confirmation.
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every message with its publish state and actions.
    List,
    /// Show one message in the edit form without saving.
    Show { id: String },
    /// Create a message.
    Add {
        #[command(flatten)]
        fields: FormFields,
        /// Print the filled form instead of saving it.
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Change fields of an existing message.
    Edit {
        id: String,
        #[command(flatten)]
        fields: FormFields,
        #[arg(long = "clear-begins", conflicts_with = "begins")]
        clear_begins: bool,
        #[arg(long = "clear-expires", conflicts_with = "expires")]
        clear_expires: bool,
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Make a message visible now.
    Publish { id: String },
    /// Hide a message now.
    Unpublish { id: String },
    Delete { id: String },
    /// Fetch and print the tag groups.
    Tags,
    /// Run a list control by id, e.g. `pm-publish-42`.
    Activate { control: String },
    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormFields {
    #[arg(long = "content")]
    pub content: Option<String>,

    #[arg(
        long = "level",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Level>())
    )]
    pub level: Option<Level>,

    /// Checked tags; repeat or comma-separate. Replaces the current set.
    #[arg(long = "tag", value_delimiter = ',', action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// Clear every tag.
    #[arg(long = "no-tags", conflicts_with = "tags")]
    pub no_tags: bool,

    #[arg(long = "begins")]
    pub begins: Option<String>,

    #[arg(long = "expires")]
    pub expires: Option<String>,
}

impl FormFields {
    pub fn to_edits(&self) -> FormEdits {
        let tags = if self.no_tags {
            Some(vec![])
        } else if self.tags.is_empty() {
            None
        } else {
            Some(
                self.tags
                    .iter()
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect(),
            )
        };
        FormEdits {
            content: self.content.clone(),
            level: self.level,
            tags,
            begins: self.begins.clone(),
            expires: self.expires.clone(),
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` (or `rc.key:value`) overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
