use super::{json_pretty, EXIT_SUCCESS};
use dialoguer::Confirm;
use forkstack_schema::{example_config, CONFIG_FILE_NAMES};
use std::io::{stdin, stdout, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist config: {}", e.error))?;
    Ok(())
}

fn ensure_can_write(dest: &Path, force: bool, is_tty: bool) -> Result<(), String> {
    if !dest.exists() || force {
        return Ok(());
    }
    let refusal = format!(
        "refusing to overwrite existing {} (pass --force)",
        dest.display()
    );
    if !is_tty {
        return Err(refusal);
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("overwrite {}?", dest.display()))
        .default(false)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    if overwrite {
        Ok(())
    } else {
        Err(refusal)
    }
}

pub fn run(config: Option<&Path>, force: bool, json: bool) -> Result<u8, String> {
    let dest = config.map_or_else(|| PathBuf::from(CONFIG_FILE_NAMES[0]), Path::to_path_buf);
    let is_tty = stdin().is_terminal() && stdout().is_terminal();
    ensure_can_write(&dest, force, is_tty)?;
    write_atomic(&dest, example_config())?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": dest.display().to_string(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote {}", dest.display());
        println!("edit the [database] and [storage] sections, then run: forks create");
    }
    Ok(EXIT_SUCCESS)
}
