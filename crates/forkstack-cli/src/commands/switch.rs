use super::{core_err, json_pretty, open_orchestrator, EXIT_SUCCESS};
use forkstack_store::PointerOrigin;
use std::path::Path;

pub fn run(config: Option<&Path>, name: &str, json: bool) -> Result<u8, String> {
    let orchestrator = open_orchestrator(config)?;
    let report = orchestrator.switch(name).map_err(core_err)?;
    let current = orchestrator.current().map_err(core_err)?;

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    for warning in &report.warnings {
        eprintln!("{} {warning}", console::style("warning:").yellow().bold());
    }
    match report.previous.as_deref() {
        Some(prev) if prev != report.name => {
            println!("Switched to '{}' (was '{prev}')", report.name);
        }
        _ => println!("Switched to '{}'", report.name),
    }
    if current.origin == PointerOrigin::Override && current.name != report.name {
        eprintln!(
            "note: FORKSTACK_ENV/ENV is set to '{}' and takes precedence in this shell",
            current.name
        );
    }
    Ok(EXIT_SUCCESS)
}
