use super::{
    core_err, json_pretty, open_orchestrator, print_resources, spin_fail, spin_ok, spinner,
    EXIT_SUCCESS,
};
use forkstack_schema::generate_env_name;
use std::path::Path;

pub fn run(
    config: Option<&Path>,
    name: Option<&str>,
    from: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let orchestrator = open_orchestrator(config)?;
    let name = name.map_or_else(generate_env_name, str::to_owned);
    let source = from.unwrap_or(orchestrator.options().default_source.as_str());

    let pb = (!json).then(|| spinner(&format!("forking '{name}' from '{source}'...")));
    let report = match orchestrator.create(&name, from) {
        Ok(r) => {
            if let Some(pb) = &pb {
                spin_ok(pb, &format!("forked '{}' from '{}'", r.name, r.source));
            }
            r
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, "fork failed");
            }
            return Err(core_err(e));
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!("Created fork: {}", report.name);
        print_resources(&report.resources);
        println!("Active environment is now '{}'", report.name);
    }
    Ok(EXIT_SUCCESS)
}
