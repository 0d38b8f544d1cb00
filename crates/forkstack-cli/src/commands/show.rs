use super::{
    colorize_status, core_err, json_pretty, open_orchestrator, print_resources, EXIT_SUCCESS,
};
use std::path::Path;

pub fn run(config: Option<&Path>, name: &str, json: bool) -> Result<u8, String> {
    let orchestrator = open_orchestrator(config)?;
    let env = orchestrator.show(name).map_err(core_err)?;

    if json {
        println!("{}", json_pretty(&env)?);
        return Ok(EXIT_SUCCESS);
    }
    println!("name:      {}", env.name);
    println!("status:    {}", colorize_status(&env.status.to_string()));
    println!("source:    {}", env.source.as_deref().unwrap_or("-"));
    println!("created:   {}", env.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("active:    {}", if env.active { "yes" } else { "no" });
    if env.protected {
        println!("protected: yes");
    }
    if env.resources.is_empty() {
        println!("resources: none");
    } else {
        println!("resources:");
        print_resources(&env.resources);
    }
    Ok(EXIT_SUCCESS)
}
