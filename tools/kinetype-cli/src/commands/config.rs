//! Show or initialize the configuration file.

use kinetype_common::config::AppConfig;

pub fn run(config: AppConfig, init: bool) -> anyhow::Result<()> {
    let path = AppConfig::path();
    if init {
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            AppConfig::default().save()?;
            println!("Wrote default config: {}", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
