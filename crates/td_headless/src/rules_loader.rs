//! Loading game rules from RON files.

use std::path::Path;

use td_core::error::GameError;
use td_core::rules::GameRules;
use thiserror::Error;

/// Error type for rules loading.
#[derive(Error, Debug)]
pub enum RulesError {
    /// Rules file not found.
    #[error("Rules file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read rules file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse or print RON.
    #[error(transparent)]
    Data(#[from] GameError),
    /// The rules parse but cannot drive a game.
    #[error("Invalid rules: {0}")]
    Invalid(String),
}

/// Load rules from a RON file. Missing fields take their default values.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, malformed, or
/// describes rules a game cannot run with.
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<GameRules, RulesError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RulesError::FileNotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    let rules = GameRules::from_ron_str(&text, &path.display().to_string())?;
    validate_rules(&rules)?;
    tracing::info!(path = %path.display(), "Loaded rules");
    Ok(rules)
}

/// Load rules from `path`, or the defaults when no path is given.
///
/// # Errors
///
/// Returns an error if a given file cannot be loaded.
pub fn load_rules_or_default(path: Option<&Path>) -> Result<GameRules, RulesError> {
    path.map_or_else(|| Ok(GameRules::default()), load_rules)
}

/// The default rules as pretty RON.
///
/// # Errors
///
/// Returns an error if printing fails.
pub fn default_rules_ron() -> Result<String, RulesError> {
    Ok(GameRules::default().to_ron_string()?)
}

/// Reject rules that would stall or break a game.
///
/// # Errors
///
/// Returns [`RulesError::Invalid`] naming the first problem.
pub fn validate_rules(rules: &GameRules) -> Result<(), RulesError> {
    if rules.max_tick_ms == 0 {
        return Err(RulesError::Invalid("max_tick_ms must be positive".into()));
    }
    if rules.player_queue_limit == 0 {
        return Err(RulesError::Invalid("player_queue_limit must be positive".into()));
    }
    if !(0..=100).contains(&rules.refund_percent) {
        return Err(RulesError::Invalid(format!(
            "refund_percent must be within 0..=100, got {}",
            rules.refund_percent
        )));
    }
    if rules.starting.base_hp <= 0 {
        return Err(RulesError::Invalid("starting base_hp must be positive".into()));
    }
    for kind in td_core::units::UnitKind::ALL {
        let stats = rules.units.get(kind);
        if stats.production_time_ms == 0 {
            return Err(RulesError::Invalid(format!("{kind:?} production_time_ms must be positive")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.ron");
        std::fs::write(&path, default_rules_ron().unwrap()).unwrap();
        assert_eq!(load_rules(&path).unwrap(), GameRules::default());
    }

    #[test]
    fn test_partial_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.ron");
        std::fs::write(&path, "(base_round_reward: 80, refund_percent: 25)").unwrap();
        let rules = load_rules(&path).unwrap();
        assert_eq!(rules.base_round_reward, 80);
        assert_eq!(rules.refund_percent, 25);
        assert_eq!(rules.max_structures, GameRules::default().max_structures);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_rules(dir.path().join("nope.ron")),
            Err(RulesError::FileNotFound(_))
        ));

        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "(max_structures: \"ten\")").unwrap();
        assert!(matches!(load_rules(&path), Err(RulesError::Data(_))));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.ron");
        std::fs::write(&path, "(max_tick_ms: 0)").unwrap();
        assert!(matches!(load_rules(&path), Err(RulesError::Invalid(_))));
    }

    #[test]
    fn test_no_path_means_defaults() {
        assert_eq!(load_rules_or_default(None).unwrap(), GameRules::default());
    }
}
