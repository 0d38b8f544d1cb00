use super::{core_err, json_pretty, open_orchestrator, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use forkstack_schema::DEFAULT_ENV;
use std::path::Path;

pub fn run(config: Option<&Path>, name: &str, json: bool) -> Result<u8, String> {
    let orchestrator = open_orchestrator(config)?;

    let pb = (!json).then(|| spinner(&format!("deleting '{name}'...")));
    let report = match orchestrator.delete(name) {
        Ok(r) => {
            if let Some(pb) = &pb {
                spin_ok(pb, &format!("deleted '{name}'"));
            }
            r
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, "delete failed");
            }
            return Err(core_err(e));
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else if report.existed {
        println!("Deleted fork: {name}");
        if report.was_active {
            println!("Active environment reset to '{DEFAULT_ENV}'");
        }
    } else {
        println!("No fork named '{name}'; nothing to delete");
    }
    Ok(EXIT_SUCCESS)
}
