//! CLI commands for `radar build`

use anyhow::Result;

use super::Context;
use crate::cli::output::{is_json, print_detail, print_info, print_json, print_success};
use crate::core::build::{BuildRecord, MilestoneMatch, NewBuildRecord, StepWrite};
use crate::core::transition::MilestoneStore;

fn print_record(ctx: &Context, record: &BuildRecord) -> Result<()> {
    let catalog = ctx.db.load_catalog()?;
    let milestone = catalog
        .get(record.milestone_id)
        .map_or_else(|| format!("#{}", record.milestone_id), |m| m.name.clone());

    print_info(&format!(
        "Build {}: component {} #{} on {}",
        record.id, record.component_id, record.build_number, record.branch
    ));
    print_detail(&format!("Milestone: {milestone}"));
    if let Some(result) = &record.build_result {
        match &record.build_comment {
            Some(comment) => print_detail(&format!("Result: {result} ({comment})")),
            None => print_detail(&format!("Result: {result}")),
        }
    }
    if let Some(url) = &record.artifact_url {
        print_detail(&format!("Artifacts: {url}"));
    }
    if let Some(coverage) = record.code_coverage {
        print_detail(&format!("Coverage: {coverage:.1}%"));
    }
    print_detail(&format!("Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC")));
    Ok(())
}

pub async fn execute_create(
    ctx: &Context,
    component_id: i64,
    build_number: i64,
    branch: String,
    milestone: Option<String>,
) -> Result<()> {
    let record = ctx.db.create_build(&NewBuildRecord {
        component_id,
        build_number,
        branch,
        milestone,
    })?;

    if is_json() {
        return print_json(&record);
    }
    print_success(&format!("Registered build record {}", record.id));
    Ok(())
}

pub async fn execute_show(ctx: &Context, build_record_id: i64) -> Result<()> {
    let record = ctx.db.build(build_record_id)?;
    let steps = ctx.db.build_steps(build_record_id)?;

    if is_json() {
        return print_json(&serde_json::json!({
            "build": record,
            "steps": steps,
        }));
    }
    print_record(ctx, &record)?;
    for step in &steps {
        print_detail(&format!("Step {}: {}", step.step_name, step.step_result));
    }
    Ok(())
}

pub async fn execute_step(ctx: &Context, build_record_id: i64, name: &str, result: &str) -> Result<()> {
    let write = ctx.db.upsert_build_step(build_record_id, name, result)?;

    if is_json() {
        return print_json(&serde_json::json!({
            "build_record_id": build_record_id,
            "step_name": name,
            "step_result": result,
            "write": write,
        }));
    }
    let verb = match write {
        StepWrite::Inserted => "Recorded",
        StepWrite::Updated => "Updated",
    };
    print_success(&format!("{verb} step '{name}' of build {build_record_id}: {result}"));
    Ok(())
}

pub async fn execute_result(
    ctx: &Context,
    build_record_id: i64,
    result: &str,
    comment: Option<&str>,
) -> Result<()> {
    ctx.db.set_build_result(build_record_id, result, comment)?;
    if is_json() {
        return print_json(&ctx.db.build(build_record_id)?);
    }
    print_success(&format!("Build {build_record_id} result set to '{result}'"));
    Ok(())
}

pub async fn execute_artifacts(ctx: &Context, build_record_id: i64, url: &str) -> Result<()> {
    ctx.db.set_artifact_url(build_record_id, url)?;
    if is_json() {
        return print_json(&ctx.db.build(build_record_id)?);
    }
    print_success(&format!("Build {build_record_id} artifacts at {url}"));
    Ok(())
}

pub async fn execute_coverage(ctx: &Context, build_record_id: i64, percent: f64) -> Result<()> {
    ctx.db.set_code_coverage(build_record_id, percent)?;
    if is_json() {
        return print_json(&ctx.db.build(build_record_id)?);
    }
    print_success(&format!("Build {build_record_id} coverage set to {percent:.1}%"));
    Ok(())
}

/// Find the latest build of a component at (or above) a milestone
pub async fn execute_search(
    ctx: &Context,
    component_id: i64,
    milestone: &str,
    branch: Option<&str>,
    exact: bool,
) -> Result<()> {
    let matching = if exact {
        MilestoneMatch::Exact
    } else {
        MilestoneMatch::AtLeast
    };
    let found = ctx.db.find_latest_build(component_id, branch, milestone, matching)?;

    if is_json() {
        return print_json(&found);
    }
    match found {
        Some(record) => print_record(ctx, &record),
        None => {
            print_info(&format!("No build of component {component_id} has reached '{milestone}'"));
            Ok(())
        }
    }
}
