//! Split command: snapshot, plan, confirm and apply.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};

use crate::data::plan::Plan;
use crate::data::snapshot::Snapshot;
use crate::split::{ApplyReport, CancelFlag, Granularity, SplitError, SplitLock};
use crate::utils::{check_split_prerequisites, Settings};

/// Split command options.
#[derive(Parser)]
pub struct SplitCommand {
    /// Claude API model to use (if not specified, uses settings or default).
    #[arg(long)]
    pub model: Option<String>,

    /// Unit of decomposition: hunk (default) or file.
    #[arg(long, value_name = "hunk|file")]
    pub granularity: Option<Granularity>,

    /// Prints the plan without creating commits.
    #[arg(long)]
    pub dry_run: bool,

    /// Applies the plan without asking for confirmation.
    #[arg(long)]
    pub auto_apply: bool,

    /// Saves the validated plan to FILE (.json, .yaml or .yml).
    #[arg(long, value_name = "FILE")]
    pub save_plan: Option<PathBuf>,

    /// Uses a saved plan instead of asking the planner.
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Repository to operate on (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    pub repo: Option<PathBuf>,
}

impl SplitCommand {
    /// Executes the split command.
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load().context("Failed to load settings")?.split;
        let model = self.model.clone().or_else(|| settings.model.clone());

        let (repo, credentials) = check_split_prerequisites(
            super::repo_path(self.repo.as_ref()),
            model.as_deref(),
            self.plan.is_none(),
        )?;
        let workdir = repo.workdir()?;
        if let Some(branch) = repo.current_branch() {
            debug!(branch = %branch, "Splitting on branch");
        }
        if let Some(info) = &credentials {
            debug!(model = %info.model, "Planner credentials found");
        }

        let engine = super::build_engine(&workdir, self.granularity, &settings);
        let lock = SplitLock::new();
        let token = lock.try_acquire()?;

        println!("🔍 Analyzing uncommitted changes...");
        let snapshot = engine.snapshot()?;
        println!(
            "📦 Found {} hunk(s) and {} file operation(s) ({} granularity)",
            snapshot.hunks.len(),
            snapshot.operations.len(),
            engine.granularity()
        );

        let plan = match &self.plan {
            Some(path) => {
                let plan = Plan::load_from_file(path)?;
                plan.validate(&snapshot)
                    .map_err(SplitError::from)
                    .with_context(|| format!("Saved plan {} does not match", path.display()))?;
                plan
            }
            None => {
                let client = crate::claude::create_default_claude_client(model)?;
                let metadata = client.get_ai_client_metadata();
                println!(
                    "🤖 Asking {} ({}) for a commit plan...",
                    metadata.provider, metadata.model
                );
                engine.plan(&client, &snapshot).await?
            }
        };

        if let Some(path) = &self.save_plan {
            plan.save_to_file(path)?;
            println!("💾 Plan saved to: {}", path.display());
        }

        println!();
        print!("{}", format_plan(&plan, &snapshot));

        if self.dry_run {
            println!("\n🏁 Dry run: no commits were created.");
            return Ok(());
        }

        if !self.auto_apply {
            let confirmed = confirm_apply(
                plan.commits.len(),
                io::stdin().is_terminal(),
                &mut io::BufReader::new(io::stdin()),
            )?;
            if !confirmed {
                println!("❌ Split cancelled; nothing was committed.");
                return Ok(());
            }
        }

        let cancel = CancelFlag::new();
        let watcher = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current commit");
                watcher.cancel();
            }
        });

        // Applying blocks on git for every commit; keep it off the runtime
        // workers so the interrupt watcher stays responsive.
        let result = tokio::task::spawn_blocking(move || {
            engine.apply(&token, &plan, &snapshot, &cancel)
        })
        .await
        .context("Split worker stopped unexpectedly");
        ctrl_c.abort();

        match result? {
            Ok(report) => {
                print!("{}", format_report(&report));
                Ok(())
            }
            Err(err) => {
                let created = err.commits_created();
                if created > 0 {
                    eprintln!(
                        "⚠️  {created} commit(s) were created before the split stopped; \
                         the remaining changes are left unstaged"
                    );
                }
                Err(err.into())
            }
        }
    }
}

/// Asks whether to apply the plan.
///
/// `is_terminal` and `reader` are injected so tests can drive the prompt
/// without blocking on real stdin.
fn confirm_apply(
    commit_count: usize,
    is_terminal: bool,
    reader: &mut (dyn BufRead + Send),
) -> Result<bool> {
    if !is_terminal {
        eprintln!("warning: stdin is not interactive; pass --auto-apply to apply without a prompt");
        return Ok(false);
    }

    loop {
        print!("\n❓ Create {commit_count} commit(s)? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        if reader.read_line(&mut input)? == 0 {
            eprintln!("warning: stdin closed, cancelling split");
            return Ok(false);
        }

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => println!("Invalid choice. Please enter 'y' to apply or 'n' to cancel."),
        }
    }
}

/// Renders the plan as a numbered commit list with its units.
fn format_plan(plan: &Plan, snapshot: &Snapshot) -> String {
    let index = snapshot.index();
    let mut output = format!("📋 Plan: {} commit(s)\n", plan.commits.len());

    for (i, commit) in plan.commits.iter().enumerate() {
        output.push_str(&format!("\n  {}. {}\n", i + 1, commit.message));
        if let Some(body) = commit.effective_body() {
            for line in body.lines() {
                output.push_str(&format!("       {line}\n"));
            }
        }
        for id in &commit.ops {
            if let Some(op) = index.operations.get(id.as_str()) {
                let source = op
                    .orig_path
                    .as_deref()
                    .map(|orig| format!("{orig} -> "))
                    .unwrap_or_default();
                output.push_str(&format!("     • {} {}{}\n", op.kind, source, op.path));
            }
        }
        for id in &commit.hunks {
            if let Some((_, hunk)) = index.hunks.get(id.as_str()) {
                output.push_str(&format!(
                    "     • {} {} (+{}/-{})\n",
                    hunk.file,
                    hunk.header_line(),
                    hunk.stats.added,
                    hunk.stats.removed
                ));
            }
        }
    }

    output
}

/// Renders the created commits.
fn format_report(report: &ApplyReport) -> String {
    let mut output = format!("\n✅ Created {} commit(s):\n", report.commits.len());
    for commit in &report.commits {
        output.push_str(&format!("  {} {}\n", commit.hash, commit.message));
    }
    output
}
