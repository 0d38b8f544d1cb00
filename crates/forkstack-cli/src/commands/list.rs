use super::{colorize_status, core_err, created_ago, json_pretty, open_orchestrator, EXIT_SUCCESS};
use chrono::Utc;
use forkstack_schema::ResourceKey;
use std::path::Path;

pub fn run(config: Option<&Path>, json: bool) -> Result<u8, String> {
    let orchestrator = open_orchestrator(config)?;
    let envs = orchestrator.list().map_err(core_err)?;

    if json {
        println!("{}", json_pretty(&envs)?);
        return Ok(EXIT_SUCCESS);
    }
    if envs.is_empty() {
        println!("No forks found. Create one with: forks create");
        return Ok(EXIT_SUCCESS);
    }

    let now = Utc::now();
    println!("  {:<16} {:<12} {:<14} DATABASE", "NAME", "CREATED", "STATUS");
    for env in &envs {
        let marker = if env.active { "*" } else { " " };
        let database = env
            .resources
            .get(&ResourceKey::Database)
            .map_or("-", |h| h.external_ref.as_str());
        let more = match env.resources.len() {
            0 | 1 => String::new(),
            n => format!(" (+{} more)", n - 1),
        };
        let status = env.status.to_string();
        let pad = " ".repeat(14usize.saturating_sub(status.len()));
        println!(
            "{marker} {:<16} {:<12} {}{pad} {database}{more}",
            env.name,
            created_ago(env.created_at, now),
            colorize_status(&status),
        );
    }
    Ok(EXIT_SUCCESS)
}
