//! `forgeloop config` — Configuration management commands.

use forgeloop_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.default_provider);
            println!("   Model:      {}", config.model_for(&config.default_provider));
            println!("   Workspace:  {}", config.workspace.root().display());
            println!("   Iterations: {}", config.agent.max_iterations);
            println!(
                "   Roles:      {}",
                config.roles.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Problems that do not stop loading but will bite at run time.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.has_api_key() && !matches!(config.default_provider.as_str(), "ollama" | "vllm") {
        warnings.push(format!(
            "No API key for '{}' (set {} or FORGELOOP_API_KEY)",
            config.default_provider,
            forgeloop_config::env_key_name(&config.default_provider)
        ));
    }

    let registry = forgeloop_tools::default_registry(
        forgeloop_tools::Workspace::new(config.workspace.root()),
        std::time::Duration::from_secs(config.workspace.command_timeout_secs),
    );
    let known_tools = registry.names();
    for (name, role) in &config.roles {
        for tool in &role.tools {
            if !known_tools.contains(&tool.as_str()) {
                warnings.push(format!("Role '{name}' lists unknown tool '{tool}'"));
            }
        }
    }

    for tool in &config.agent.priority_tools {
        if !known_tools.contains(&tool.as_str()) {
            warnings.push(format!("Priority tool '{tool}' is not a registered tool"));
        }
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    // Never print secrets
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn warns_about_unknown_role_tools() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk".into());
        config
            .roles
            .get_mut("reviewer")
            .unwrap()
            .tools
            .push("web_search".into());

        let warnings = warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("web_search"));
    }

    #[test]
    fn default_config_with_key_has_no_warnings() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk".into());
        assert!(warnings(&config).is_empty());
    }
}
