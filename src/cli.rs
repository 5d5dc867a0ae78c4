use crate::variant::{Service, Variant};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

License: MIT
Rust Edition: 2024"
);

#[derive(Parser)]
#[command(name = "cloudcfg")]
#[command(about = "Select the CPU build of the cloud storage handlers in the mountlist")]
#[command(long_about = "cloudcfg switches the Dropbox and Google Drive handlers declared in the
cloud mountlist between their 68020 build and their 68060/68080 (\"102e\") build.

The mountlist is never edited in place. The rewritten version is staged next
to it, the old one is set aside as a backup and the staged copy renamed over
it. If the final rename fails the backup is put back.

VARIANTS:
  68k     68020 build (Handler = Devs:Cloud/<service>-handler.68k)
  102e    68060/80 build (Handler = Devs:Cloud/<service>-handler_102e.68k)

EXAMPLES:
  cloudcfg detect                       Show the build currently selected
  cloudcfg apply 102e                   Switch both services to the 102e build
  cloudcfg apply 68k --dry-run          Show what switching back would change
  cloudcfg status --json                Report handlers, keyfile and client codes
  cloudcfg token save dropbox CODE      Store the Dropbox client code
  cloudcfg token purge google-drive     Force a fresh Google Drive login")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
struct Cli {
    /// Cloud directory (default from config: Devs:Cloud)
    #[arg(long, global = true, value_name = "DIR")]
    cloud_dir: Option<PathBuf>,

    /// Write debug logs to ~/.cloudcfg/cloudcfg.log
    #[arg(long, global = true)]
    debug: bool,

    /// Disable coloured output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which handler build the mountlist selects
    #[command(long_about = "Scan the mountlist for a 102e handler declaration.

Reports 102e if any Dropbox or Google Drive declaration names the 102e build,
68k otherwise. A missing or unreadable mountlist reports 68k.

EXAMPLES:
  cloudcfg detect")]
    Detect,

    /// Switch the handler declarations to a build
    #[command(long_about = "Rewrite every Dropbox and Google Drive handler declaration in the
mountlist to name the chosen build. All other lines are kept byte for byte.

OPTIONS:
  -d, --dry-run    Show the lines that would change without writing
  -u, --unified    With --dry-run, print a unified diff instead
  -n, --context    Context lines for the unified diff (default: 3)

EXAMPLES:
  cloudcfg apply 102e
  cloudcfg apply 68k --dry-run
  cloudcfg apply 102e --dry-run --unified -n 1")]
    Apply {
        /// Build to select: 68k or 102e
        #[arg(value_name = "VARIANT")]
        variant: Variant,

        /// Preview changes without modifying the mountlist
        #[arg(short = 'd', long = "dry-run")]
        dry_run: bool,

        /// Print a unified diff in dry-run mode
        #[arg(short = 'u', long, requires = "dry_run")]
        unified: bool,

        /// Context lines around changes in the unified diff
        #[arg(short = 'n', long, value_name = "NUM", default_value_t = 3)]
        context: usize,
    },

    /// Report the variant, installed handlers, keyfile and client codes
    #[command(long_about = "Report everything the configuration panel shows:

  - the handler build the mountlist selects
  - which handler builds are installed for each service
  - whether a registration keyfile is present
  - whether a client code is stored for each service

EXAMPLES:
  cloudcfg status
  cloudcfg status --json")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage client codes and session tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Show or reset the configuration file
    #[command(long_about = "Show the cloudcfg configuration file (~/.cloudcfg/config.toml).

If the file doesn't exist, a default one will be created.

CONFIGURATION OPTIONS:
  [cloud]
    dir = \"Devs:Cloud\"              # Cloud directory
    mountlist = \"cloud.mountlist\"   # Mountlist file name

  [mountlist]
    stale_backup = \"clear\"          # clear or abort
    check_disk_space = true

  [logging]
    debug = false

EXAMPLES:
  cloudcfg config                 Show configuration path and values
  cloudcfg config --reset         Rewrite the default configuration")]
    Config {
        /// Restore the default configuration file
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a client code
    Save {
        #[arg(value_name = "SERVICE")]
        service: Service,
        /// Client code as shown by the service's authorisation page
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Show the stored client code
    Show {
        #[arg(value_name = "SERVICE")]
        service: Service,
    },

    /// Store a client code read from a file
    Load {
        #[arg(value_name = "SERVICE")]
        service: Service,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Delete session tokens so the handler logs in again
    Purge {
        #[arg(value_name = "SERVICE")]
        service: Service,
    },
}

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub cloud_dir: Option<PathBuf>,
    pub debug: bool,
    pub no_color: bool,
}

#[derive(Debug)]
pub enum Args {
    Detect,
    Apply {
        variant: Variant,
        dry_run: bool,
        unified: bool,
        context: usize,
    },
    Status {
        json: bool,
    },
    TokenSave {
        service: Service,
        code: String,
    },
    TokenShow {
        service: Service,
    },
    TokenLoad {
        service: Service,
        file: PathBuf,
    },
    TokenPurge {
        service: Service,
    },
    Config {
        reset: bool,
    },
}

pub fn parse_args() -> (GlobalOpts, Args) {
    into_args(Cli::parse())
}

fn into_args(cli: Cli) -> (GlobalOpts, Args) {
    let opts = GlobalOpts {
        cloud_dir: cli.cloud_dir,
        debug: cli.debug,
        no_color: cli.no_color,
    };

    let args = match cli.command {
        Commands::Detect => Args::Detect,
        Commands::Apply {
            variant,
            dry_run,
            unified,
            context,
        } => Args::Apply {
            variant,
            dry_run,
            unified,
            context,
        },
        Commands::Status { json } => Args::Status { json },
        Commands::Token { action } => match action {
            TokenAction::Save { service, code } => Args::TokenSave { service, code },
            TokenAction::Show { service } => Args::TokenShow { service },
            TokenAction::Load { service, file } => Args::TokenLoad { service, file },
            TokenAction::Purge { service } => Args::TokenPurge { service },
        },
        Commands::Config { reset } => Args::Config { reset },
    };

    (opts, args)
}
