use crate::infra::{demo_job, seed_candidates, InMemoryCandidateStore, InMemorySavedFilterStore};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use talent_pipeline::config::PipelineConfig;
use talent_pipeline::error::AppError;
use talent_pipeline::workflows::candidates::{
    load_shared, BulkArtifact, BulkCommand, BulkOutcome, ExportFormat, Notification,
    NotificationSink, PipelineSession, SavedFilterRegistry, SelectionScope, Severity, Stage,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Write the exported shortlist to this path instead of printing it.
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
    /// Export tab-separated values instead of CSV.
    #[arg(long)]
    pub(crate) tsv: bool,
}

struct ConsoleNotifications;

impl NotificationSink for ConsoleNotifications {
    fn publish(&self, notification: &Notification) {
        let marker = match notification.severity {
            Severity::Success => "ok",
            Severity::Info => "info",
            Severity::Error => "error",
        };
        let undo = if notification.undo.is_some() {
            " [Undo]"
        } else {
            ""
        };
        println!("  ({marker}) {}{undo}", notification.message);
    }
}

type DemoSession = PipelineSession<InMemoryCandidateStore, ConsoleNotifications>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = PipelineConfig::default();
    let mut clock = Utc::now();
    let store = Arc::new(InMemoryCandidateStore::seeded(seed_candidates(clock)));
    let mut session = PipelineSession::new(store, Arc::new(ConsoleNotifications), &config);
    let loaded = session.load(Some(demo_job()))?;

    println!("Candidate pipeline demo ({loaded} candidates)");
    render_board(&session, clock);

    println!("\nSearching for \"reliability\"");
    session.set_search_query("reliability", clock);
    clock += config.search_debounce();
    session.tick(clock);
    for candidate in session.visible() {
        println!("  - {} ({})", candidate.name, candidate.position);
    }
    session.clear_filter();

    println!("\nScreening every new applicant");
    session.select_all(SelectionScope::Stage(Stage::New));
    let moved = session.apply_bulk(
        &BulkCommand::MoveToStage {
            stage: Stage::Screening,
        },
        |_| true,
        clock,
    )?;
    render_board(&session, clock);

    if let BulkOutcome::Completed(receipt) = moved {
        if let Some(token) = receipt.undo {
            clock += Duration::seconds(5);
            println!("\nUndoing the move 5s later");
            if let Err(err) = session.undo(token, clock) {
                println!("  undo failed: {err}");
            }
            render_board(&session, clock);
        }
    }

    println!("\nShortlisting candidates rated 4 or higher");
    session.update_filter(|filter| filter.rating_min = 4.0);
    session.select_all(SelectionScope::AllVisible);
    let format = if args.tsv {
        ExportFormat::Tsv
    } else {
        ExportFormat::Csv
    };
    let exported = session.apply_bulk(&BulkCommand::Export { format }, |_| true, clock)?;
    if let BulkOutcome::Completed(receipt) = exported {
        if let Some(BulkArtifact::Export(file)) = receipt.artifact {
            match &args.export {
                Some(path) => {
                    std::fs::write(path, file.body.as_bytes())?;
                    println!("  wrote {} to {}", file.file_name, path.display());
                }
                None => {
                    for line in file.body.lines() {
                        println!("  | {line}");
                    }
                }
            }
        }
    }

    let registry = SavedFilterRegistry::new(
        Arc::new(InMemorySavedFilterStore::default()),
        config.share_base_url.clone(),
    );
    let saved = registry.save("Top Candidates", session.filter().clone(), clock)?;
    let link = registry.share(&saved.id)?;
    println!("\nShared \"{}\" as {link}", saved.name);
    session.clear_filter();
    session.replace_filter(load_shared(link.as_str())?);
    println!(
        "  opening the link shows {} candidate(s)",
        session.visible().len()
    );

    println!("\nDeleting the lowest-rated candidate");
    session.clear_filter();
    session.clear_selection();
    let lowest = session
        .visible()
        .into_iter()
        .filter(|candidate| !candidate.ratings.is_empty())
        .min_by(|a, b| a.rating().total_cmp(&b.rating()))
        .map(|candidate| candidate.id.clone());
    if let Some(id) = lowest {
        session.toggle(&id)?;
        let deleted = session.apply_bulk(
            &BulkCommand::Delete,
            |request| {
                println!("  confirm: {}", request.prompt);
                true
            },
            clock,
        )?;
        println!("  {} candidate(s) remain", session.candidates().len());
        if let BulkOutcome::Completed(receipt) = deleted {
            if let Some(token) = receipt.undo {
                if let Err(err) = session.undo(token, clock + Duration::seconds(10)) {
                    println!("  undo failed: {err}");
                }
            }
        }
        println!("  {} candidate(s) after undo", session.candidates().len());
    }

    Ok(())
}

fn render_board(session: &DemoSession, now: DateTime<Utc>) {
    let views = session.visible_views(now);
    for column in session.stage_counts() {
        if column.count == 0 {
            continue;
        }
        let names: Vec<&str> = views
            .iter()
            .filter(|view| view.stage == column.stage)
            .map(|view| view.name.as_str())
            .collect();
        let header = format!("{} ({})", column.label, column.count);
        println!("  {header:<24} {}", names.join(", "));
    }
}
