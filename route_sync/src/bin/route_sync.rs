use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use route_sync::activation::outcome::{ActivationObserver, DayOutcome};
use route_sync::activation::status::active_span;
use route_sync::activation::{ActivationOptions, Activator};
use route_sync::calendar::calendar_span;
use route_sync::config::{Settings, load_settings_path};
use route_sync::catalog::stops::{STOP_CHUNK_SIZE, sync_active_stops};
use route_sync::coverage::{coverage, day_status, is_active, status_runs};
use route_sync::db::connection::connect_sqlite;
use route_sync::db::migrate::run_pending;
use route_sync::import_set::models::Import;
use route_sync::import_set::repo::SqliteImportRepo;
use route_sync::import_set::route_set::RouteSet;
use route_sync::import_set::{ImportError, ImportOutcome, ImportRepo, import_route_set};
use route_sync::models::ActiveJourney;

#[derive(Parser)]
#[command(version, about = "Route data import and timetable activation")]
struct Cli {
    /// Settings file; defaults to $ROUTE_SYNC_CONFIG, then built-in defaults
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct Range {
    /// First date (YYYY-MM-DD)
    from: Option<NaiveDate>,
    /// Last date (YYYY-MM-DD)
    to: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Import a route set directory into the catalog
    Import {
        /// Directory with catalog documents
        path: PathBuf,
        /// Import even if the route set is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Materialize active journeys and calls
    Activate {
        #[command(flatten)]
        range: Range,
        /// Rebuild every date
        #[arg(long)]
        force: bool,
        /// Only build dates without journeys
        #[arg(long = "missing")]
        missing_only: bool,
        /// Import to activate; must be the latest imported one
        #[arg(long)]
        import: Option<i32>,
    },
    /// Remove active journeys and calls
    Deactivate {
        #[command(flatten)]
        range: Range,
        /// Deactivate every date before today
        #[arg(long, conflicts_with_all = ["from", "to"])]
        old: bool,
        /// Delete status rows instead of resetting them
        #[arg(long)]
        purge: bool,
    },
    /// List dates whose active data differs from the catalog
    Validate {
        #[command(flatten)]
        range: Range,
    },
    /// Show activation status
    Status {
        /// Show one date only
        date: Option<NaiveDate>,
        /// List status runs over the active span
        #[arg(long)]
        detail: bool,
    },
    /// Flag stop places served by the current catalog as active
    SyncStops,
    /// Manage recorded imports
    Imports {
        #[command(subcommand)]
        sub: ImportsSub,
    },
}

#[derive(Subcommand)]
enum ImportsSub {
    /// List imports
    List,
    /// Remove imports; without options, remove every unused import
    Remove {
        /// Import id
        #[arg(long, conflicts_with = "path")]
        id: Option<i32>,
        /// Route set path
        #[arg(long)]
        path: Option<String>,
    },
}

/// Prints one line per processed date.
#[derive(Default)]
struct Progress {
    journeys: usize,
}

impl ActivationObserver for Progress {
    fn on_date_processed(&mut self, date: NaiveDate, outcome: &DayOutcome) {
        if outcome.rebuilds() {
            println!("{date}: {outcome} ({} journeys)", self.journeys);
        } else {
            println!("{date}: {outcome}");
        }
        self.journeys = 0;
    }

    fn on_journey_processed(&mut self, _journey: &ActiveJourney) {
        self.journeys += 1;
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => load_settings_path(path)?,
        None => Settings::from_env()?,
    };
    let mut conn = connect_sqlite(&settings.database_url)?;
    run_pending(&mut conn)?;
    let repo = SqliteImportRepo::new();
    let today = settings.today()?;
    let lookahead = |from: NaiveDate| {
        from.checked_add_days(Days::new(settings.activation_period_days))
            .unwrap_or(NaiveDate::MAX)
    };

    match cli.cmd {
        Cmd::Import { path, force } => {
            let set = RouteSet::open(&path)?;
            match import_route_set(&mut conn, &repo, &set, force, settings.batch_size)? {
                ImportOutcome::Skipped(import) => {
                    println!("route set unchanged, already imported as {}", import.id)
                }
                ImportOutcome::Imported { import, report } => {
                    println!("{report}");
                    println!("{}", describe_import(&import));
                }
            }
        }

        Cmd::Activate {
            range,
            force,
            missing_only,
            import,
        } => {
            let import = match import {
                Some(id) => repo.find(&mut conn, id)?.ok_or(ImportError::NotFound(id))?,
                None => repo
                    .latest_imported(&mut conn)?
                    .context("no imported route set, run `route-sync import` first")?,
            };
            let from = range.from.unwrap_or(today);
            let to = range.to.unwrap_or_else(|| lookahead(from));
            let mut activator = Activator::from_settings(&settings).with_observer(Progress::default());
            let summary = activator.activate(
                &mut conn,
                &import,
                from,
                to,
                ActivationOptions {
                    force,
                    missing_only,
                },
            )?;
            println!("{summary}");
            if summary.had_errors {
                return Ok(ExitCode::FAILURE);
            }
        }

        Cmd::Deactivate { range, old, purge } => {
            let Some((first, last)) = active_span(&mut conn)? else {
                println!("nothing to deactivate");
                return Ok(ExitCode::SUCCESS);
            };
            let (from, to) = if old {
                (first, today.pred_opt().unwrap_or(NaiveDate::MIN))
            } else {
                (range.from.unwrap_or(first), range.to.unwrap_or(last))
            };
            if from > to {
                println!("nothing to deactivate");
                return Ok(ExitCode::SUCCESS);
            }
            let mut activator = Activator::from_settings(&settings).with_observer(Progress::default());
            let days = activator.deactivate(&mut conn, from, to, purge)?;
            println!("{days} days deactivated");
        }

        Cmd::Validate { range } => {
            let from = range.from.unwrap_or(today);
            let to = range.to.unwrap_or_else(|| lookahead(from));
            let differing = Activator::from_settings(&settings).validate(&mut conn, from, to)?;
            for date in &differing {
                println!("{date}: requires activation");
            }
            println!("{} of {} days require activation", differing.len(), (to - from).num_days() + 1);
        }

        Cmd::Status { date: Some(date), .. } => match day_status(&mut conn, date)? {
            Some(status) => println!("{status}"),
            None => println!("{date}  <missing>"),
        },

        Cmd::Status { date: None, detail } => {
            if let Some(import) = repo.latest(&mut conn)? {
                println!("latest import: {}", describe_import(&import));
            }
            if let Some((from, to)) = calendar_span(&mut conn)? {
                println!("calendar: {from}..={to}");
            }
            let span = active_span(&mut conn)?;
            if let Some((from, to)) = span {
                println!("active: {from}..={to}");
            }
            println!("{}", coverage(&mut conn, today, lookahead(today), None)?);
            if let Some(current) = repo.latest_imported(&mut conn)? {
                let ready = is_active(&mut conn, today, settings.activation_period_days, current.id)?;
                let verdict = if ready { "fully" } else { "not fully" };
                println!("look-ahead {verdict} activated by import {}", current.id);
            }
            if let (true, Some((from, to))) = (detail, span) {
                for run in status_runs(&mut conn, from, to)? {
                    println!("{run}");
                }
            }
        }

        Cmd::SyncStops => {
            println!("{}", sync_active_stops(&mut conn, STOP_CHUNK_SIZE)?);
        }

        Cmd::Imports { sub: ImportsSub::List } => {
            for import in repo.list(&mut conn)? {
                println!("{}", describe_import(&import));
            }
        }

        Cmd::Imports {
            sub: ImportsSub::Remove { id, path },
        } => {
            let doomed = match (id, path) {
                (Some(id), _) => vec![repo.find(&mut conn, id)?.ok_or(ImportError::NotFound(id))?],
                (None, Some(path)) => repo.find_by_path(&mut conn, &path)?,
                (None, None) => repo.unused(&mut conn)?,
            };
            for import in &doomed {
                repo.remove(&mut conn, import.id)?;
                println!("removed {}", describe_import(import));
            }
            println!("{} imports removed", doomed.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn describe_import(import: &Import) -> String {
    let window = match import.availability() {
        Some((from, to)) => format!("{from}..={to}"),
        None => "-".to_string(),
    };
    format!(
        "#{} {} {} {} files {} bytes, valid {} [{}] {}",
        import.id,
        import.import_status,
        import.created_at,
        import.files,
        import.size,
        window,
        import.fingerprint.get(..12).unwrap_or(&import.fingerprint),
        import.path,
    )
}
