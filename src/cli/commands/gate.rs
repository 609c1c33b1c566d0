//! CLI commands for `radar gate`

use anyhow::Result;
use clap::Args;

use super::Context;
use crate::cli::output::{is_json, print_block, print_info, print_json, print_success};
use crate::core::quality_gate::{
    gate_history, list_active_quality_gates, upsert_quality_gate, GateChange, GateFields, QualityGate,
};

/// Quality gate definition
#[derive(Args, Debug, Clone)]
pub struct GateArgs {
    /// Gate name (unique among active gates, case-insensitive)
    pub name: String,

    /// What the gate measures
    #[arg(long, default_value = "")]
    pub description: String,

    /// Gate type
    #[arg(long = "type", value_name = "TYPE")]
    pub gate_type: String,

    /// Passing threshold
    #[arg(long, allow_negative_numbers = true)]
    pub pass: i64,

    /// Failing threshold
    #[arg(long, allow_negative_numbers = true)]
    pub fail: i64,

    /// Lowest valid value
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub min: i64,

    /// Highest valid value
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    pub max: i64,
}

impl From<GateArgs> for GateFields {
    fn from(args: GateArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
            gate_type: args.gate_type,
            pass: args.pass,
            fail: args.fail,
            min: args.min,
            max: args.max,
        }
    }
}

fn format_gates(gates: &[QualityGate]) -> String {
    let mut out = format!(
        "{:>5}  {:<16} {:<12} {:>5} {:>5} {:>5} {:>5}  {}",
        "ID", "NAME", "TYPE", "PASS", "FAIL", "MIN", "MAX", "ACTIVE"
    );
    for g in gates {
        out.push_str(&format!(
            "\n{:>5}  {:<16} {:<12} {:>5} {:>5} {:>5} {:>5}  {}",
            g.id,
            g.name,
            g.gate_type,
            g.pass,
            g.fail,
            g.min,
            g.max,
            if g.active { "yes" } else { "no" }
        ));
    }
    out
}

async fn write_gate(ctx: &Context, change: GateChange, args: GateArgs) -> Result<()> {
    let fields = GateFields::from(args);
    let id = upsert_quality_gate(&ctx.db, change, &fields)?;

    if is_json() {
        return print_json(&serde_json::json!({
            "status": "success",
            "id": id,
            "name": fields.name,
        }));
    }
    let verb = match change {
        GateChange::Create => "Created",
        GateChange::Update => "Updated",
    };
    print_success(&format!("{verb} quality gate '{}' (id {id})", fields.name));
    Ok(())
}

pub async fn execute_create(ctx: &Context, args: GateArgs) -> Result<()> {
    write_gate(ctx, GateChange::Create, args).await
}

pub async fn execute_update(ctx: &Context, args: GateArgs) -> Result<()> {
    write_gate(ctx, GateChange::Update, args).await
}

pub async fn execute_list(ctx: &Context) -> Result<()> {
    let gates = list_active_quality_gates(&ctx.db)?;
    if is_json() {
        return print_json(&gates);
    }
    if gates.is_empty() {
        print_info("No quality gates defined");
        return Ok(());
    }
    print_block(&format_gates(&gates));
    Ok(())
}

pub async fn execute_history(ctx: &Context, name: &str) -> Result<()> {
    let rows = gate_history(&ctx.db, name)?;
    if is_json() {
        return print_json(&rows);
    }
    print_block(&format_gates(&rows));
    Ok(())
}
