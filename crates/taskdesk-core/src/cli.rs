use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

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
    name = "taskdesk",
    version,
    about = "Terminal client for the task and user management backend",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key, e.g. `--set api.base_url=http://host:8080`.
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Where the session token is kept.
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and keep the token for later commands.
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored token.
    Logout,
    /// Show the signed-in session.
    Whoami {
        /// Also look up the matching user record.
        #[arg(long)]
        profile: bool,
    },
    #[command(subcommand)]
    Tasks(TaskCommand),
    #[command(subcommand)]
    Users(UserCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub title: Option<String>,
    /// `true` or `false`.
    #[arg(long)]
    pub completed: Option<String>,
    /// YYYY-MM-DD.
    #[arg(long = "due-before")]
    pub due_before: Option<String>,
    /// Only honoured for admins.
    #[arg(long = "user")]
    pub user_id: Option<String>,
}

impl FilterArgs {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none() && self.due_before.is_none() && self.user_id.is_none()
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Zero-based page.
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// YYYY-MM-DD.
        #[arg(long)]
        due: String,
        /// Owner id; only honoured for admins.
        #[arg(long = "user")]
        user_id: Option<i64>,
    },
    Edit {
        id: i64,
        /// Page the task is listed on.
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    Complete {
        id: i64,
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    Delete {
        id: i64,
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        mail: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "USER")]
        role: String,
    },
    Edit {
        id: i64,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        mail: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    Delete {
        id: i64,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(short, long)]
        yes: bool,
    },
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

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, KeyVal, TaskCommand, UserCommand};

    #[test]
    fn keyval_requires_equals() {
        let kv: KeyVal = " list.page_size = 20 ".parse().expect("keyval");
        assert_eq!(kv.key, "list.page_size");
        assert_eq!(kv.value, "20");
        assert!("list.page_size".parse::<KeyVal>().is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = GlobalCli::try_parse_from([
            "taskdesk",
            "tasks",
            "list",
            "--completed",
            "true",
            "--page",
            "2",
            "-vv",
            "--set",
            "list.page_size=5",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.overrides.len(), 1);
        match cli.command {
            Command::Tasks(TaskCommand::List { filters, page }) => {
                assert_eq!(filters.completed.as_deref(), Some("true"));
                assert!(filters.title.is_none());
                assert_eq!(page, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn user_add_defaults_to_plain_role() {
        let cli = GlobalCli::try_parse_from([
            "taskdesk", "users", "add", "--name", "Bo", "--mail", "bo@example.com", "--password", "secret1",
        ])
        .expect("parse");
        match cli.command {
            Command::Users(UserCommand::Add { role, .. }) => assert_eq!(role, "USER"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn task_add_needs_due_date() {
        assert!(GlobalCli::try_parse_from(["taskdesk", "tasks", "add", "Write report"]).is_err());
    }
}
