//! `forgeloop onboard` — First-time setup.

use std::path::Path;

use forgeloop_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let workspace_dir = AppConfig::workspace_dir();

    println!("forgeloop — First-Time Setup");
    println!("============================\n");

    for line in setup(&config_dir, &workspace_dir)? {
        println!("{line}");
    }

    println!("\nNext steps:");
    println!(
        "   1. Edit {} and add your API key (or export ANTHROPIC_API_KEY)",
        config_dir.join("config.toml").display()
    );
    println!("   2. Run: forgeloop agent");
    println!("   3. Add roles under [roles.<name>] to delegate work to sub-agents\n");

    Ok(())
}

/// Create the config and workspace directories and a default config file.
/// Existing files are left alone. Returns one status line per step.
fn setup(config_dir: &Path, workspace_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut report = Vec::new();

    if config_dir.exists() {
        report.push(format!("  Config directory exists: {}", config_dir.display()));
    } else {
        std::fs::create_dir_all(config_dir)?;
        report.push(format!("✅ Created config directory: {}", config_dir.display()));
    }

    if workspace_dir.exists() {
        report.push(format!("  Workspace exists: {}", workspace_dir.display()));
    } else {
        std::fs::create_dir_all(workspace_dir)?;
        report.push(format!("✅ Created workspace: {}", workspace_dir.display()));
    }

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        report.push(format!(
            "⚠️  Config already exists at: {} (edit it or delete it and re-run onboard)",
            config_path.display()
        ));
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        report.push(format!("✅ Created config.toml at: {}", config_path.display()));
    }

    Ok(report)
}
