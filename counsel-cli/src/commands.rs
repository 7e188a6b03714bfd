//! CLI subcommand handlers.

use counsel_core::EngineConfig;
use counsel_tools::LegalStore;

use crate::{Commands, ConfigAction, DbAction};

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, config: &EngineConfig) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, config),
        Commands::Db { action } => handle_db(action, config),
    }
}

fn handle_config(action: ConfigAction, config: &EngineConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn handle_db(action: DbAction, config: &EngineConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Init { seed } => {
            let path = config.actions.resolved_database_path();
            let store = LegalStore::open(&path)?;
            if seed {
                store.seed()?;
                println!("Seeded local store at: {}", path.display());
            } else {
                println!("Created local store at: {}", path.display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_show_output_parses_back() {
        let config = EngineConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
