use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::PASSWORD_ENV;
use crate::crypto::KdfParams;
use crate::module;
use crate::secret::SensitiveString;
use crate::store::{Credentials, Database};

#[derive(Parser)]
#[command(name = "passgroup")]
#[command(version)]
#[command(about = "Manages groups in an encrypted password database", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// JSON file holding the module arguments (read from stdin when omitted)
    pub args_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new, empty database.
    Init {
        /// Path of the database to create
        database: PathBuf,
        #[command(flatten)]
        unlock: UnlockArgs,
    },
    /// List all groups in a database.
    #[command(alias = "ls")]
    List {
        /// Path of the database
        database: PathBuf,
        #[command(flatten)]
        unlock: UnlockArgs,
    },
}

#[derive(Args)]
pub struct UnlockArgs {
    /// Key file used as a credential factor
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,
    /// Do not use a password; requires --keyfile
    #[arg(long, requires = "keyfile")]
    pub no_password: bool,
}

impl UnlockArgs {
    fn credentials(&self) -> Result<Credentials> {
        let password = if self.no_password {
            None
        } else if let Ok(password) = std::env::var(PASSWORD_ENV) {
            Some(password)
        } else {
            Some(rpassword::prompt_password("Database Password: ")
                .map_err(|e| anyhow!("Error reading database password: {}", e))?)
        };
        let credentials = Credentials::new(
            password.filter(|p| !p.is_empty()).map(SensitiveString::from),
            self.keyfile.clone(),
        );
        if credentials.is_empty() {
            return Err(anyhow!("Either a password or a keyfile (or both) is required"));
        }
        Ok(credentials)
    }
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        None => run_module(cli.args_file.as_deref()),
        Some(Commands::Init { database, unlock }) => {
            let credentials = unlock.credentials()?;
            Database::create(&database, &credentials, KdfParams::default())?;
            println!("Created {}", database.display());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::List { database, unlock }) => {
            let credentials = unlock.credentials()?;
            let db = Database::open(&database, &credentials)?;
            let groups = db.root_group().walk();
            if groups.is_empty() {
                println!("No groups stored.");
            }
            for (depth, group) in groups {
                println!("{}{} (icon {})", "  ".repeat(depth), group.name, group.icon_id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Module mode: read the arguments, print exactly one JSON object.
fn run_module(args_file: Option<&Path>) -> Result<ExitCode> {
    let json = match args_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Could not read arguments file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Could not read arguments from stdin")?;
            buf
        }
    };

    let result = module::run(&json);
    println!("{}", result.to_json());
    Ok(if result.is_failure() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
