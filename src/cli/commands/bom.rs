//! CLI commands for `radar bom`

use anyhow::Result;

use super::{BomCommands, Context};
use crate::cli::output::{is_json, print_block, print_detail, print_info, print_json, print_success};
use crate::core::bom::{BomDetails, ExternalPackage, NewBom, ScmCoordinates};
use crate::core::graph::DependencyGraphAssembler;
use crate::infra::db::Database;

/// Execute a BOM subcommand
pub async fn execute(ctx: &Context, command: BomCommands) -> Result<()> {
    let db = &ctx.db;
    match command {
        BomCommands::Create {
            build,
            bom_type,
            build_system,
            build_system_version,
        } => {
            let bom = db.create_bom(&NewBom {
                build_record_id: build,
                bom_type,
                build_system,
                build_system_version,
            })?;
            if is_json() {
                return print_json(&bom);
            }
            print_success(&format!("Created {} BOM for build {}", bom.bom_type, build));
            Ok(())
        }
        BomCommands::Show { build } => {
            let details = db.bom_details(build)?;
            if is_json() {
                return print_json(&details);
            }
            print_details(&details);
            Ok(())
        }
        BomCommands::Lock { build } => {
            db.lock_bom(build)?;
            done(db, build, &format!("Locked BOM for build {build}"))
        }
        BomCommands::Antivirus { build, dat_version } => {
            db.set_antivirus_dat_version(build, &dat_version)?;
            done(db, build, &format!("Antivirus DAT version set to {dat_version}"))
        }
        BomCommands::EcmRecord { build, record } => {
            db.set_ecm_mock_master_record(build, &record)?;
            done(db, build, &format!("Change-management record set to {record}"))
        }
        BomCommands::Agent { build, name } => {
            db.add_build_agent(build, &name)?;
            done(db, build, &format!("Added build agent {name}"))
        }
        BomCommands::Export {
            build,
            order,
            scm_type,
            scm_version,
            protocol,
            server,
            path,
            tag,
            commit,
        } => {
            let export = db.add_code_export(
                build,
                &ScmCoordinates {
                    scm_type,
                    scm_version,
                    scm_protocol: protocol,
                    scm_server: server,
                    scm_path: path,
                    scm_tag: tag,
                    scm_commit: commit,
                },
                order,
            )?;
            if is_json() {
                return print_json(&export);
            }
            print_success(&format!(
                "Added code export #{} ({}:{})",
                export.scm_order, export.scm.scm_server, export.scm.scm_path
            ));
            Ok(())
        }
        BomCommands::Orbit {
            build,
            dependency,
            order,
        } => {
            let dep = db.add_orbit_dependency(build, dependency, order)?;
            if is_json() {
                return print_json(&dep);
            }
            print_success(&format!(
                "Build {} depends on build {} (Orbit #{})",
                dep.build_record_id, dep.dependency_build_record_id, dep.scm_order
            ));
            Ok(())
        }
        BomCommands::Ecm {
            build,
            order,
            master_id,
            project,
            pkg_version,
            build_number,
            package_number,
        } => {
            let dep = db.add_ecm_dependency(
                build,
                &ExternalPackage {
                    master_id,
                    project_name: project,
                    version: pkg_version,
                    build_number,
                    package_number,
                },
                order,
            )?;
            if is_json() {
                return print_json(&dep);
            }
            print_success(&format!(
                "Build {} depends on {} (ECM #{})",
                dep.build_record_id, dep.package, dep.scm_order
            ));
            Ok(())
        }
        BomCommands::Graph { build, dot, max_depth } => {
            let max_depth = max_depth.unwrap_or_else(|| ctx.config.graph_max_depth());
            let view = DependencyGraphAssembler::new(db)
                .with_max_depth(max_depth)
                .build_graph(build)?;
            if is_json() {
                return print_json(&view);
            }
            if dot {
                // DOT goes to stdout even in quiet mode so it can be piped
                println!("{}", view.format_dot());
            } else {
                print_block(&view.format_tree());
            }
            Ok(())
        }
        BomCommands::Table { build, max_depth } => {
            let max_depth = max_depth.unwrap_or_else(|| ctx.config.graph_max_depth());
            let table = DependencyGraphAssembler::new(db)
                .with_max_depth(max_depth)
                .build_table(build)?;
            if is_json() {
                return print_json(&table);
            }
            if table.is_empty() {
                print_info(&format!("Build {build} has no recorded dependencies"));
            } else {
                print_block(&table.format_table());
            }
            Ok(())
        }
    }
}

/// Report a BOM mutation, printing the updated BOM in JSON mode
fn done(db: &Database, build: i64, message: &str) -> Result<()> {
    if is_json() {
        return print_json(&db.bom_details(build)?.bom);
    }
    print_success(message);
    Ok(())
}

fn print_details(details: &BomDetails) {
    let bom = &details.bom;
    print_info(&format!(
        "BOM for build {} ({}, {} {}){}",
        bom.build_record_id,
        bom.bom_type,
        bom.build_system,
        bom.build_system_version,
        if bom.locked { " [locked]" } else { "" }
    ));
    if let Some(dat) = &bom.antivirus_dat_version {
        print_detail(&format!("Antivirus DAT: {dat}"));
    }
    if let Some(record) = &bom.ecm_mock_master_record_id {
        print_detail(&format!("Change-management record: {record}"));
    }
    if !details.agents.is_empty() {
        print_detail(&format!("Agents: {}", details.agents.join(", ")));
    }
    for export in &details.code_exports {
        let scm = &export.scm;
        let mut line = format!(
            "Export #{}: {} {}://{}/{}",
            export.scm_order, scm.scm_type, scm.scm_protocol, scm.scm_server, scm.scm_path
        );
        if let Some(tag) = &scm.scm_tag {
            line.push_str(&format!(" tag {tag}"));
        }
        if let Some(commit) = &scm.scm_commit {
            line.push_str(&format!(" commit {commit}"));
        }
        print_detail(&line);
    }
    for dep in &details.orbit_dependencies {
        print_detail(&format!("Orbit #{}: build {}", dep.scm_order, dep.dependency_build_record_id));
    }
    for dep in &details.ecm_dependencies {
        print_detail(&format!("ECM #{}: {}", dep.scm_order, dep.package));
    }
}
