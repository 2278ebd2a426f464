use anyhow::Context;
use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "glm-chat";

/// Resolve and create one of the app's directories.
///
/// `GLM_HOME/<kind>` wins, then `$<xdg_var>/glm-chat`, then
/// `~/<home_fallback>/glm-chat`.
fn app_dir(kind: &str, xdg_var: &str, home_fallback: &[&str]) -> anyhow::Result<PathBuf> {
    let dir = if let Some(base) = env::var_os("GLM_HOME") {
        PathBuf::from(base).join(kind)
    } else if let Some(xdg) = env::var_os(xdg_var) {
        PathBuf::from(xdg).join(APP_DIR)
    } else {
        let home = env::var_os("HOME").context("HOME is not set")?;
        home_fallback
            .iter()
            .fold(PathBuf::from(home), |p, seg| p.join(seg))
            .join(APP_DIR)
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {kind} directory: {}", dir.display()))?;
    Ok(dir)
}

pub fn config_dir() -> anyhow::Result<PathBuf> {
    app_dir("config", "XDG_CONFIG_HOME", &[".config"])
}

pub fn state_dir() -> anyhow::Result<PathBuf> {
    app_dir("state", "XDG_STATE_HOME", &[".local", "state"])
}

/// File holding the stored conversation of a named session.
pub fn session_context_path(session: &str) -> anyhow::Result<PathBuf> {
    validate_session_name(session)?;
    Ok(state_dir()?.join("sessions").join(format!("{session}.json")))
}

fn validate_session_name(session: &str) -> anyhow::Result<()> {
    let ok = !session.is_empty()
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !session.starts_with('.');
    if !ok {
        anyhow::bail!("invalid session name {session:?}: use letters, digits, '-', '_' or '.'");
    }
    Ok(())
}
