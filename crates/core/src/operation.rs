// crates/core/src/operation.rs
//! Typed maintenance operations and parsing of action command lines.
//!
//! An action line is a JSON object like `{"command":"upload --diff-from=base nightly"}`.
//! The command text is split with POSIX shell rules and the tokens are parsed
//! with clap, one subcommand per verb.

use backup_controller_types::Location;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::CommandError;

/// Local timestamp used as the backup name when `create` is given none.
pub const DEFAULT_NAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Verbs accepted on the action endpoint.
pub const KNOWN_VERBS: &[&str] = &["create", "upload", "download", "restore", "delete"];

/// Operation class; metrics are kept per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    Create,
    Upload,
    Download,
    Restore,
    Delete,
}

impl CommandClass {
    /// Classes that get their own counters and gauges.
    pub const TRACKED: [CommandClass; 4] = [
        CommandClass::Create,
        CommandClass::Upload,
        CommandClass::Download,
        CommandClass::Restore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Restore => "restore",
            Self::Delete => "delete",
        }
    }

    /// Detached operations run on a background task and are acknowledged
    /// immediately. `delete` runs inside the request.
    pub fn is_detached(&self) -> bool {
        !matches!(self, Self::Delete)
    }

    pub fn is_tracked(&self) -> bool {
        Self::TRACKED.contains(self)
    }
}

impl std::fmt::Display for CommandClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create {
        name: String,
        table: Option<String>,
        schema_only: bool,
    },
    Upload {
        name: String,
        table: Option<String>,
        diff_from: Option<String>,
        schema_only: bool,
    },
    Download {
        name: String,
        table: Option<String>,
        schema_only: bool,
    },
    Restore {
        name: String,
        table: Option<String>,
        schema_only: bool,
        data_only: bool,
        drop_table: bool,
    },
    Delete {
        location: Location,
        name: String,
    },
}

impl Operation {
    pub fn class(&self) -> CommandClass {
        match self {
            Self::Create { .. } => CommandClass::Create,
            Self::Upload { .. } => CommandClass::Upload,
            Self::Download { .. } => CommandClass::Download,
            Self::Restore { .. } => CommandClass::Restore,
            Self::Delete { .. } => CommandClass::Delete,
        }
    }

    pub fn backup_name(&self) -> &str {
        match self {
            Self::Create { name, .. }
            | Self::Upload { name, .. }
            | Self::Download { name, .. }
            | Self::Restore { name, .. }
            | Self::Delete { name, .. } => name,
        }
    }

    /// Arguments for the backup tool, verb first.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.class().as_str().to_string()];
        let table_arg = |args: &mut Vec<String>, table: &Option<String>| {
            if let Some(t) = table {
                args.push(format!("--table={t}"));
            }
        };
        match self {
            Self::Create {
                name,
                table,
                schema_only,
            }
            | Self::Download {
                name,
                table,
                schema_only,
            } => {
                table_arg(&mut args, table);
                if *schema_only {
                    args.push("--schema".into());
                }
                push_name(&mut args, name);
            }
            Self::Upload {
                name,
                table,
                diff_from,
                schema_only,
            } => {
                table_arg(&mut args, table);
                if let Some(from) = diff_from {
                    args.push(format!("--diff-from={from}"));
                }
                if *schema_only {
                    args.push("--schema".into());
                }
                push_name(&mut args, name);
            }
            Self::Restore {
                name,
                table,
                schema_only,
                data_only,
                drop_table,
            } => {
                table_arg(&mut args, table);
                if *schema_only {
                    args.push("--schema".into());
                }
                if *data_only {
                    args.push("--data".into());
                }
                if *drop_table {
                    args.push("--rm".into());
                }
                push_name(&mut args, name);
            }
            Self::Delete { location, name } => {
                args.push(location.as_str().to_string());
                push_name(&mut args, name);
            }
        }
        args
    }

    /// Reject arguments the backup tool cannot receive. A NUL byte cannot
    /// cross `exec` and has no shell quoting.
    pub fn check_arguments(&self) -> Result<(), CommandError> {
        if self.to_args().iter().any(|arg| arg.contains('\0')) {
            return Err(CommandError::NulByte(self.class().as_str().to_string()));
        }
        Ok(())
    }

    /// Command text as stored in the ledger, quoted so it splits back into
    /// the same arguments.
    pub fn command_line(&self) -> String {
        let args = self.to_args();
        shlex::try_join(args.iter().map(String::as_str)).unwrap_or_else(|_| args.join(" "))
    }
}

/// Names that look like flags go after `--` so they parse back as names.
fn push_name(args: &mut Vec<String>, name: &str) {
    if name.starts_with('-') {
        args.push("--".into());
    }
    args.push(name.to_string());
}

/// Name given to a `create` without an explicit name.
pub fn default_backup_name() -> String {
    chrono::Local::now().format(DEFAULT_NAME_FORMAT).to_string()
}

/// One line of a `POST /backup/actions` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRow {
    pub command: String,
}

/// Parse one JSON action line into an operation.
pub fn parse_action_row(line: &str) -> Result<Operation, CommandError> {
    let row: ActionRow =
        serde_json::from_str(line).map_err(|e| CommandError::MalformedRow(e.to_string()))?;
    parse_command(&row.command)
}

/// Parse command text such as `restore --rm --table='db.*' nightly`.
pub fn parse_command(command: &str) -> Result<Operation, CommandError> {
    let tokens = shlex::split(command).ok_or_else(|| CommandError::Tokenize(command.to_string()))?;
    let verb = tokens.first().ok_or(CommandError::Empty)?;
    if !KNOWN_VERBS.contains(&verb.as_str()) {
        return Err(CommandError::UnknownCommand(verb.clone()));
    }

    let parsed = ActionCli::try_parse_from(&tokens).map_err(|e| CommandError::InvalidArguments {
        verb: verb.clone(),
        message: first_line(&e.to_string()),
    })?;
    let operation = parsed.verb.into_operation();
    operation.check_arguments()?;
    Ok(operation)
}

fn first_line(message: &str) -> String {
    message
        .lines()
        .map(|l| l.trim_start_matches("error: ").trim())
        .find(|l| !l.is_empty())
        .unwrap_or("invalid arguments")
        .to_string()
}

#[derive(Debug, Parser)]
#[command(
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct ActionCli {
    #[command(subcommand)]
    verb: Verb,
}

#[derive(Debug, Args)]
struct Selection {
    /// Table name pattern, e.g. `db.*`.
    #[arg(long, short = 't', alias = "tables")]
    table: Option<String>,
    #[arg(long, short = 's')]
    schema: bool,
}

#[derive(Debug, Subcommand)]
enum Verb {
    Create {
        #[command(flatten)]
        selection: Selection,
        name: Option<String>,
    },
    Upload {
        #[command(flatten)]
        selection: Selection,
        #[arg(long = "diff-from")]
        diff_from: Option<String>,
        name: String,
    },
    Download {
        #[command(flatten)]
        selection: Selection,
        name: String,
    },
    Restore {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, short = 'd')]
        data: bool,
        #[arg(long = "rm", alias = "drop")]
        drop_table: bool,
        name: String,
    },
    Delete {
        location: Location,
        name: String,
    },
}

impl Verb {
    fn into_operation(self) -> Operation {
        match self {
            Verb::Create { selection, name } => Operation::Create {
                name: name.unwrap_or_else(default_backup_name),
                table: selection.table,
                schema_only: selection.schema,
            },
            Verb::Upload {
                selection,
                diff_from,
                name,
            } => Operation::Upload {
                name,
                table: selection.table,
                diff_from,
                schema_only: selection.schema,
            },
            Verb::Download { selection, name } => Operation::Download {
                name,
                table: selection.table,
                schema_only: selection.schema,
            },
            Verb::Restore {
                selection,
                data,
                drop_table,
                name,
            } => Operation::Restore {
                name,
                table: selection.table,
                schema_only: selection.schema,
                data_only: data,
                drop_table,
            },
            Verb::Delete { location, name } => Operation::Delete { location, name },
        }
    }
}
