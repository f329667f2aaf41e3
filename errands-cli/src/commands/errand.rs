//! Errand command handlers
//!
//! Handles listing and deleting errands.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use errands_client::{ErrandFilter, ErrandsClient};
use errands_core::domain::errand::{Errand, ErrandStatus};

use crate::config::Config;

/// Filters accepted by `errands list`
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ListFilter {
    /// Only errands of this type
    #[arg(long = "type", id = "kind")]
    pub kind: Option<String>,

    /// Only errands with one of these statuses; comma delimited
    /// (inactive, active, completed, failed, blocked)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<ErrandStatus>,
}

/// Arguments of `errands delete`
///
/// Deletes one errand by ID, or every errand of a type whose status matches.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct DeleteArgs {
    /// ID of a single errand to delete
    #[arg(conflicts_with = "kind")]
    pub id: Option<String>,

    /// Delete errands of this type
    #[arg(long = "type", id = "kind", required_unless_present = "id")]
    pub kind: Option<String>,

    /// Delete only errands with one of these statuses; comma delimited
    #[arg(long, value_delimiter = ',', default_value = "failed")]
    pub status: Vec<ErrandStatus>,

    /// Print what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// List errands
pub async fn list_errands(config: &Config, filter: ListFilter) -> Result<()> {
    let client = ErrandsClient::new(&config.endpoint);

    let errands = fetch_errands(&client, filter.kind.as_deref(), &filter.status).await?;

    if errands.is_empty() {
        println!("{}", "No errands found.".yellow());
    } else {
        println!("{}", format!("Found {} errand(s):", errands.len()).bold());
        println!();
        for errand in &errands {
            print_errand_summary(errand);
        }
    }

    Ok(())
}

/// Delete a single errand, or every errand matching a type and statuses
pub async fn delete_errands(config: &Config, args: DeleteArgs) -> Result<()> {
    let client = ErrandsClient::new(&config.endpoint);

    if let Some(id) = args.id.as_deref() {
        client
            .delete_errand(id)
            .await
            .with_context(|| format!("delete errand {}", id))?;
        println!("{} Deleted errand {}", "✓".green(), id.cyan());
        return Ok(());
    }

    let Some(kind) = args.kind.as_deref() else {
        bail!("errand type is required for bulk deletion");
    };

    let errands = fetch_errands(&client, Some(kind), &args.status).await?;
    if errands.is_empty() {
        println!("{}", "No matching errands.".yellow());
        return Ok(());
    }

    let mut failures = 0;
    for errand in &errands {
        if args.dry_run {
            println!(
                "{} delete {}: ({}) {}",
                "(dry-run)".dimmed(),
                errand.id.cyan(),
                colorize_status(&errand.status),
                errand.name
            );
            continue;
        }

        match client.delete_errand(&errand.id).await {
            Ok(()) => println!("{} Deleted errand {}", "✓".green(), errand.id.cyan()),
            Err(e) => {
                failures += 1;
                eprintln!("{} Failed to delete errand {}: {}", "✗".red(), errand.id, e);
            }
        }
    }

    if failures > 0 {
        bail!("failed to delete {} of {} errand(s)", failures, errands.len());
    }

    Ok(())
}

async fn fetch_errands(
    client: &ErrandsClient,
    kind: Option<&str>,
    statuses: &[ErrandStatus],
) -> Result<Vec<Errand>> {
    let errands = match kind {
        Some(kind) => client
            .list_errands_by(&ErrandFilter::Type(kind.to_string()))
            .await
            .with_context(|| format!("list errands of type {}", kind))?,
        None => client.list_errands().await.context("list errands")?,
    };

    Ok(select(errands, statuses))
}

/// Keeps errands with one of `statuses` (all of them when empty), newest first
fn select(mut errands: Vec<Errand>, statuses: &[ErrandStatus]) -> Vec<Errand> {
    if !statuses.is_empty() {
        errands.retain(|errand| statuses.contains(&errand.status));
    }
    errands.sort_by(|a, b| b.created.cmp(&a.created));
    errands
}

/// Print an errand summary
fn print_errand_summary(errand: &Errand) {
    println!("  {} Errand {}", "▸".cyan(), errand.id.dimmed());
    println!("    Name:     {}", errand.name);
    println!("    Type:     {}", errand.kind);
    println!("    Status:   {}", colorize_status(&errand.status));
    if let Some(created) = errand.created_at() {
        println!(
            "    Created:  {}",
            created.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    if errand.attempts > 0 {
        println!("    Attempts: {}", errand.attempts);
    }
    if let Some(reason) = last_failure(errand) {
        println!("    Failure:  {}", reason.red());
    }
    println!();
}

/// Most recent error log line, shown for failed errands
fn last_failure(errand: &Errand) -> Option<&str> {
    if errand.status != ErrandStatus::Failed {
        return None;
    }
    errand
        .logs
        .iter()
        .rev()
        .find(|log| log.severity.eq_ignore_ascii_case("error"))
        .map(|log| log.message.as_str())
}

/// Colorize errand status for display
fn colorize_status(status: &ErrandStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        ErrandStatus::Inactive => status_str.yellow(),
        ErrandStatus::Active => status_str.cyan(),
        ErrandStatus::Completed => status_str.green(),
        ErrandStatus::Failed => status_str.red(),
        ErrandStatus::Blocked => status_str.dimmed(),
    }
}
