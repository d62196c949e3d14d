//! `scopeward config show|validate|init`.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

pub fn show(repo_root: &Path) -> Result<()> {
    let config = Config::load_or_default(&repo_root.join("scopeward.toml"))?.apply_env();
    println!("{}", toml::to_string_pretty(&config).context("failed to render configuration")?);
    Ok(())
}

pub fn validate(repo_root: &Path) -> Result<()> {
    let config = Config::load_or_default(&repo_root.join("scopeward.toml"))?.apply_env();
    config.validate()?;
    println!("scopeward.toml is valid.");
    Ok(())
}

pub fn init(repo_root: &Path) -> Result<()> {
    let path = repo_root.join("scopeward.toml");
    if path.exists() {
        anyhow::bail!("{} already exists; remove it first if you want to regenerate it", path.display());
    }
    Config::default().save(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scopeward.toml"), "").unwrap();
        assert!(init(dir.path()).is_err());
    }

    #[test]
    fn init_then_validate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path()).unwrap();
        assert!(validate(dir.path()).is_ok());
    }
}
