//! CLI commands for `radar milestone`

use anyhow::Result;

use super::Context;
use crate::cli::output::{is_json, print_block, print_detail, print_info, print_json, print_success, print_warning};
use crate::core::milestone::Milestone;
use crate::core::transition::{MilestoneStore, MilestoneTracker, NotificationStatus, TransitionRequest};
use crate::infra::notifier::ConfiguredNotifier;

fn format_milestones(milestones: &[Milestone]) -> String {
    let mut out = format!("{:<20} {:>6}  {}", "NAME", "LEVEL", "ACTIVE");
    for m in milestones {
        out.push_str(&format!(
            "\n{:<20} {:>6}  {}",
            m.name,
            m.level,
            if m.active { "yes" } else { "no" }
        ));
    }
    out
}

/// List the catalog
pub async fn execute_list(ctx: &Context, active_only: bool) -> Result<()> {
    let catalog = ctx.db.load_catalog()?;
    let milestones: Vec<Milestone> = if active_only {
        catalog.active().cloned().collect()
    } else {
        catalog.all().to_vec()
    };

    if is_json() {
        return print_json(&milestones);
    }
    if milestones.is_empty() {
        print_info("No milestones defined (run `radar init --seed`)");
        return Ok(());
    }
    print_block(&format_milestones(&milestones));
    Ok(())
}

pub async fn execute_define(ctx: &Context, name: &str, level: i64, active: bool) -> Result<()> {
    let milestone = ctx.db.define_milestone(name, level, active)?;
    if is_json() {
        return print_json(&milestone);
    }
    print_success(&format!("Defined milestone '{}' at level {}", milestone.name, milestone.level));
    Ok(())
}

pub async fn execute_set_active(ctx: &Context, name: &str, active: bool) -> Result<()> {
    let milestone = ctx.db.set_milestone_active(name, active)?;
    if is_json() {
        return print_json(&milestone);
    }
    print_success(&format!(
        "Milestone '{}' {}",
        milestone.name,
        if active { "activated" } else { "deactivated" }
    ));
    Ok(())
}

/// Move a build to a milestone and report the notification outcome
pub async fn execute_progress(
    ctx: &Context,
    build_record_id: i64,
    target: &str,
    actor: &str,
    comment: Option<String>,
) -> Result<()> {
    let notifier = ConfiguredNotifier::from_config(&ctx.config)?;
    let tracker = MilestoneTracker::new(&ctx.db, &notifier);
    let request = TransitionRequest {
        build_record_id,
        target: target.to_string(),
        actor: actor.to_string(),
        comment,
    };
    let outcome = tracker.apply_transition(&request).await?;

    if is_json() {
        return print_json(&outcome);
    }

    if outcome.previous.id == outcome.current.id {
        print_success(&format!(
            "Build {} stays on '{}' (recorded)",
            build_record_id, outcome.current.name
        ));
    } else {
        print_success(&format!(
            "Build {} moved from '{}' to '{}'",
            build_record_id, outcome.previous.name, outcome.current.name
        ));
    }
    match &outcome.notification {
        NotificationStatus::Sent => print_detail("Change-management record updated"),
        NotificationStatus::Skipped => print_detail("No change-management record; notification skipped"),
        NotificationStatus::Failed(reason) => {
            print_warning(&format!("Change-management notification failed: {reason}"));
        }
    }
    Ok(())
}

pub async fn execute_history(ctx: &Context, build_record_id: i64) -> Result<()> {
    let notifier = ConfiguredNotifier::from_config(&ctx.config)?;
    let tracker = MilestoneTracker::new(&ctx.db, &notifier);
    let history = tracker.history(build_record_id)?;
    let entries = history.describe(&ctx.db.load_catalog()?);

    if is_json() {
        return print_json(&entries);
    }
    if entries.is_empty() {
        print_info(&format!("Build {build_record_id} has no milestone history"));
        return Ok(());
    }

    let mut out = format!("{:<25} {:<12} {:<12} {:<12} {}", "WHEN", "FROM", "TO", "ACTOR", "COMMENT");
    for e in &entries {
        out.push_str(&format!(
            "\n{:<25} {:<12} {:<12} {:<12} {}",
            e.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            e.previous_milestone,
            e.new_milestone,
            e.actor,
            e.comment.as_deref().unwrap_or("")
        ));
    }
    print_block(&out);
    Ok(())
}

pub async fn execute_progressions(ctx: &Context, build_record_id: i64) -> Result<()> {
    let notifier = ConfiguredNotifier::from_config(&ctx.config)?;
    let tracker = MilestoneTracker::new(&ctx.db, &notifier);
    let milestones = tracker.available_progressions(build_record_id)?;

    if is_json() {
        return print_json(&milestones);
    }
    print_block(&format_milestones(&milestones));
    Ok(())
}

pub async fn execute_current(ctx: &Context, build_record_id: i64) -> Result<()> {
    let notifier = ConfiguredNotifier::from_config(&ctx.config)?;
    let tracker = MilestoneTracker::new(&ctx.db, &notifier);
    let milestone = tracker.current_milestone(build_record_id)?;

    if is_json() {
        return print_json(&milestone);
    }
    print_info(&format!(
        "Build {} is on '{}' (level {})",
        build_record_id, milestone.name, milestone.level
    ));
    Ok(())
}
