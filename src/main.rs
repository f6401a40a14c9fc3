use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use snapvault::cli::{handle_snapshot_command, SnapshotCommands, StoreArgs};
use snapvault::config::{paths::SnapvaultPaths, settings::Settings};

#[derive(Parser)]
#[command(
    name = "snapvault",
    author = "Kaylee Beyene",
    version,
    about = "Rotating rsync snapshots with hard-link deduplication",
    long_about = "Snapvault keeps a rotating set of dated snapshots of a directory. \
                  Each snapshot is a full tree copied by rsync and hard-linked against \
                  the previous one, so unchanged files cost no extra space. Old \
                  snapshots are pruned after a retention period."
)]
struct Cli {
    /// Directory holding config.json
    #[arg(long, global = true, env = "SNAPVAULT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Snapshot(SnapshotCommands),

    /// Write a settings file, taking values from the given options
    Init {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.config_dir {
        Some(dir) => SnapvaultPaths::with_base_dir(dir),
        None => SnapvaultPaths::new()?,
    };
    let mut settings = Settings::load_or_create(&paths)?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    match cli.command {
        Some(Commands::Snapshot(cmd)) => {
            handle_snapshot_command(&settings, cmd)?;
        }
        Some(Commands::Init { store }) => {
            store.apply(&mut settings);
            settings.validate()?;
            settings.save(&paths)?;
            println!("Settings written to: {}", paths.settings_file().display());
            if settings.source.is_none() || settings.destination.is_none() {
                println!();
                println!("Set \"source\" and \"destination\" in that file, or pass");
                println!("--source and --dest to each command.");
            }
        }
        Some(Commands::Config) => {
            println!("Snapvault Configuration");
            println!("=======================");
            println!("Config directory: {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            if !paths.is_initialized() {
                println!("                  (not written yet, run 'snapvault init')");
            }
            println!();
            println!("Settings:");
            println!("  Source:            {}", display_opt(&settings.source));
            println!("  Destination:       {}", display_opt(&settings.destination));
            println!("  Transfer program:  {}", settings.transfer_program);
            println!("  Transfer options:  {}", settings.transfer_options.join(" "));
            println!("  Link option:       {}", settings.link_dest_option);
            println!("  Retry ceiling:     {}", settings.retry_ceiling);
            println!("  Retention:         {}", settings.retention());
            println!("  Name format:       {}", settings.timestamp_format);
            println!("  Lock store:        {}", settings.use_lock);
            println!("  Log level:         {}", settings.log_level);
        }
        None => {
            println!("Snapvault - rotating rsync snapshots");
            println!();
            println!("Run 'snapvault --help' for usage information.");
            println!("Run 'snapvault run --source <DIR> --dest <DIR>' to take a snapshot.");
        }
    }

    Ok(())
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
