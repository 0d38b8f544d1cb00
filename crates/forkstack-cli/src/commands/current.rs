use super::{core_err, json_pretty, open_orchestrator, EXIT_SUCCESS};
use forkstack_store::PointerOrigin;
use std::path::Path;

pub fn run(config: Option<&Path>, json: bool) -> Result<u8, String> {
    let orchestrator = open_orchestrator(config)?;
    let current = orchestrator.current().map_err(core_err)?;

    if json {
        println!("{}", json_pretty(&current)?);
    } else {
        println!("{}", current.name);
        match current.origin {
            PointerOrigin::Override => eprintln!("(from FORKSTACK_ENV/ENV)"),
            PointerOrigin::Default => eprintln!("(default; no environment selected)"),
            PointerOrigin::Pointer => {}
        }
        if !current.exists {
            eprintln!(
                "{} '{}' is not a known environment",
                console::style("warning:").yellow().bold(),
                current.name
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
