use crate::config::ConfigStore;
use crate::decisions::DecisionProvider;
use crate::error::RunError;
use anyhow::Result;

/// Decide which model to run with.
///
/// An explicitly requested model wins and never touches the config. Otherwise
/// the configured default is used if still installed, and failing that the
/// operator is asked (and may persist the pick as the new default).
pub fn select_model(
    models: &[String],
    config: &mut ConfigStore,
    decisions: &mut dyn DecisionProvider,
    requested: Option<&str>,
) -> Result<String> {
    if models.is_empty() {
        return Err(RunError::NoModelAvailable.into());
    }

    if let Some(requested) = requested {
        if models.iter().any(|m| m == requested) {
            tracing::info!(model = requested, "Using requested model");
            return Ok(requested.to_string());
        }
        tracing::error!(model = requested, "Requested model is not installed");
        return Err(RunError::NoModelSelected.into());
    }

    if let Some(default) = config.default_model() {
        if models.iter().any(|m| m == default) {
            tracing::info!(model = default, "Using default model");
            return Ok(default.to_string());
        }
        tracing::warn!(model = default, "Default model is no longer available");
    }

    let Some(choice) = decisions.choose_model(models)? else {
        return Err(RunError::NoModelSelected.into());
    };
    if choice.save_as_default {
        config.set_default_model(&choice.model);
        tracing::info!(model = %choice.model, path = %config.path().display(), "Saved default model");
    }
    Ok(choice.model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::{ScriptedDecisions, WatchAnswer};
    use crate::tui::ModelChoice;
    use tempfile::TempDir;

    fn models() -> Vec<String> {
        vec!["gemma2:9b".to_string(), "llama3:8b".to_string()]
    }

    fn pick(model: &str, save: bool) -> ScriptedDecisions {
        ScriptedDecisions::new(
            Some(ModelChoice {
                model: model.to_string(),
                save_as_default: save,
            }),
            WatchAnswer::No,
        )
    }

    fn downcast(err: anyhow::Error) -> RunError {
        err.downcast::<RunError>().unwrap()
    }

    #[test]
    fn no_models_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = ConfigStore::load(tmp.path().join("c.json"));
        let err = select_model(&[], &mut cfg, &mut pick("x", false), None).unwrap_err();
        assert!(matches!(downcast(err), RunError::NoModelAvailable));
    }

    #[test]
    fn installed_default_skips_prompt() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = ConfigStore::load(tmp.path().join("c.json"));
        cfg.set_default_model("llama3:8b");
        let mut d = pick("gemma2:9b", false);
        assert_eq!(
            select_model(&models(), &mut cfg, &mut d, None).unwrap(),
            "llama3:8b"
        );
        assert_eq!(d.model_prompts, 0);
    }

    #[test]
    fn stale_default_prompts_and_persists_choice() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        let mut cfg = ConfigStore::load(path.clone());
        cfg.set_default_model("removed:1b");
        let mut d = pick("gemma2:9b", true);

        assert_eq!(
            select_model(&models(), &mut cfg, &mut d, None).unwrap(),
            "gemma2:9b"
        );
        assert_eq!(d.model_prompts, 1);
        assert_eq!(ConfigStore::load(path).default_model(), Some("gemma2:9b"));
    }

    #[test]
    fn unsaved_choice_leaves_config_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        let mut cfg = ConfigStore::load(path.clone());
        select_model(&models(), &mut cfg, &mut pick("gemma2:9b", false), None).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn declined_prompt_is_no_model_selected() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = ConfigStore::load(tmp.path().join("c.json"));
        let mut d = ScriptedDecisions::new(None, WatchAnswer::No);
        let err = select_model(&models(), &mut cfg, &mut d, None).unwrap_err();
        assert!(matches!(downcast(err), RunError::NoModelSelected));
    }

    #[test]
    fn requested_model_must_be_installed() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = ConfigStore::load(tmp.path().join("c.json"));
        let mut d = pick("gemma2:9b", true);
        assert_eq!(
            select_model(&models(), &mut cfg, &mut d, Some("llama3:8b")).unwrap(),
            "llama3:8b"
        );
        let err = select_model(&models(), &mut cfg, &mut d, Some("nope")).unwrap_err();
        assert!(matches!(downcast(err), RunError::NoModelSelected));
        assert_eq!(d.model_prompts, 0);
        assert_eq!(cfg.default_model(), None);
    }
}
