use clap::Parser;
use earshot::config::{self, metadata::MetadataConfig};
use earshot::migration;
use earshot::services::{backfill::BackfillService, cache::CacheService, metadata::MetadataService};
use sea_orm_migration::MigratorTrait;
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "earshot-migrate-artists")]
#[command(about = "Re-parse every post's URL and fix stored title, artist and thumbnail", long_about = None)]
struct Args {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "earshot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !args.yes && !args.dry_run && !confirm()? {
        println!("Aborted.");
        return Ok(());
    }

    let db = config::database::get_database().await?;
    migration::Migrator::up(&db, None).await?;

    let cache = match config::redis::get_redis().await {
        Ok(conn) => conn.map(CacheService::new),
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    };
    let metadata = MetadataService::new(MetadataConfig::from_env(), cache)?;

    let report = BackfillService::new(db, metadata).run(args.dry_run).await?;

    let verb = if args.dry_run { "Would update" } else { "Updated" };
    println!(
        "{verb} {} of {} posts ({} unchanged, {} failed)",
        report.updated, report.total, report.skipped, report.failed
    );
    Ok(())
}

fn confirm() -> anyhow::Result<bool> {
    print!("This rewrites metadata for every post. Continue? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
