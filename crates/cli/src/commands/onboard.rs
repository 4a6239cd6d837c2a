//! `studyforge onboard` — write a default config file.

use anyhow::Context;

use studyforge_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Wrote default config to {}", config_path.display());
    println!("Set STUDYFORGE_API_KEY (model) and BRAVE_API_KEY (search) to get started.");
    Ok(())
}
