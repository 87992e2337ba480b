use gallery_sync::config::{DriveConfig, GalleryConfig};
use gallery_sync::logging;
use gallery_sync::pipeline::{Pipeline, RunMode};
use gallery_sync::sync::engine::SyncOptions;
use gallery_sync::sync::tree::render_tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run(RunMode, SyncOptions),
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut stage = None;
    let mut list = false;
    let mut options = SyncOptions::default();
    let mut help = false;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--force" => options.force = true,
            "--dry-run" => options.dry_run = true,
            "--list" => list = true,
            "--sync-only" | "--process-only" => {
                let requested = if arg == "--sync-only" {
                    RunMode::SyncOnly
                } else {
                    RunMode::ProcessOnly
                };
                if stage.is_some_and(|current| current != requested) {
                    anyhow::bail!("--sync-only and --process-only are mutually exclusive");
                }
                stage = Some(requested);
            }
            "--help" | "-h" => help = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    if help {
        return Ok(CliMode::Help);
    }
    let mode = if list {
        RunMode::List
    } else {
        stage.unwrap_or(RunMode::All)
    };
    Ok(CliMode::Run(mode, options))
}

fn print_usage() {
    println!("Usage: gallery-sync [--force] [--dry-run] [--sync-only | --process-only] [--list]");
    println!("  --force          Re-download every file and rebuild the sync manifest");
    println!("  --dry-run        Log intended changes without touching disk");
    println!("  --sync-only      Skip thumbnail and manifest generation");
    println!("  --process-only   Only regenerate thumbnails and the image manifest");
    println!("  --list           Print the remote folder tree and exit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let (mode, options) = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            print_usage();
            return Ok(());
        }
        CliMode::Run(mode, options) => (mode, options),
    };

    let gallery = GalleryConfig::from_env();
    let drive = if mode.needs_remote() {
        Some(DriveConfig::from_env()?)
    } else {
        None
    };

    let summary = Pipeline::new(gallery, drive, options).run(mode).await?;
    if let Some(tree) = summary.tree {
        print!("{}", render_tree(&tree));
    }
    Ok(())
}
