//! CLI command for `radar init`

use anyhow::Result;

use super::Context;
use crate::cli::output::{is_json, print_detail, print_json, print_success};

/// Execute the init command
///
/// Opening the context already created the schema; seeding is optional
/// and skips milestones that exist.
pub async fn execute(ctx: &Context, seed: bool) -> Result<()> {
    let seeded = if seed { ctx.db.seed_default_milestones()? } else { 0 };
    let milestones = ctx.db.list_milestones()?;

    if is_json() {
        return print_json(&serde_json::json!({
            "status": "success",
            "seeded": seeded,
            "milestones": milestones,
        }));
    }

    print_success("Database ready");
    if seed {
        print_detail(&format!("Seeded {seeded} default milestones"));
    }
    for m in &milestones {
        print_detail(&format!("{} (level {})", m.name, m.level));
    }
    Ok(())
}
