//! Runtime configuration service.
//!
//! Holds the process-wide state the orchestrators consult on every call:
//! the admin-configured credential/model override and the sticky
//! fallback-model flag. Explicit state behind accessor methods, never a
//! bare global, so tests can inject and reset deterministically.

use crate::settings::Settings;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct AdminOverrides {
    provider_api_key: Option<String>,
    chat_model_id: Option<String>,
}

pub struct RuntimeConfig {
    settings: Settings,
    overrides: RwLock<AdminOverrides>,
    /// Sticky: set on a rate-limit response, never auto-cleared. Cleared
    /// only through [`RuntimeConfig::reset_for_tests`].
    fallback_model_active: AtomicBool,
}

impl RuntimeConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            overrides: RwLock::new(AdminOverrides::default()),
            fallback_model_active: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolves the primary-provider credential. The admin override takes
    /// precedence over the environment default and is re-read on every
    /// call since it may change at runtime.
    pub fn provider_api_key(&self) -> String {
        let overrides = self.overrides.read().expect("overrides lock poisoned");
        overrides
            .provider_api_key
            .clone()
            .unwrap_or_else(|| self.settings.llm.api_key.clone())
    }

    /// Resolves the chat model id: admin override first, otherwise the
    /// primary or fallback configured name depending on the sticky flag.
    pub fn chat_model_id(&self) -> String {
        let overrides = self.overrides.read().expect("overrides lock poisoned");
        if let Some(model) = &overrides.chat_model_id {
            return model.clone();
        }
        if self.fallback_model_active() {
            self.settings.llm.fallback_model.clone()
        } else {
            self.settings.llm.primary_model.clone()
        }
    }

    pub fn set_admin_override(&self, api_key: Option<String>, chat_model_id: Option<String>) {
        let mut overrides = self.overrides.write().expect("overrides lock poisoned");
        overrides.provider_api_key = api_key;
        overrides.chat_model_id = chat_model_id;
    }

    pub fn fallback_model_active(&self) -> bool {
        self.fallback_model_active.load(Ordering::SeqCst)
    }

    /// Routes subsequent calls to the fallback chat model. Sticky until a
    /// test reset; primary-provider recovery does not clear it.
    pub fn activate_fallback_model(&self) {
        if !self.fallback_model_active.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                fallback_model = %self.settings.llm.fallback_model,
                "Rate limit hit, switching chat completions to the fallback model"
            );
        }
    }

    /// Test-only reset: clears the sticky flag and admin overrides.
    pub fn reset_for_tests(&self) {
        self.fallback_model_active.store(false, Ordering::SeqCst);
        let mut overrides = self.overrides.write().expect("overrides lock poisoned");
        *overrides = AdminOverrides::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_override_precedence() {
        let rt = RuntimeConfig::new(Settings::for_tests());
        assert_eq!(rt.chat_model_id(), "gpt-4o");
        assert_eq!(rt.provider_api_key(), "sk-test");

        rt.set_admin_override(Some("sk-admin".into()), Some("gpt-4-turbo".into()));
        assert_eq!(rt.chat_model_id(), "gpt-4-turbo");
        assert_eq!(rt.provider_api_key(), "sk-admin");

        rt.reset_for_tests();
        assert_eq!(rt.chat_model_id(), "gpt-4o");
    }

    #[test]
    fn test_sticky_fallback_flag() {
        let rt = RuntimeConfig::new(Settings::for_tests());
        assert!(!rt.fallback_model_active());

        rt.activate_fallback_model();
        assert!(rt.fallback_model_active());
        assert_eq!(rt.chat_model_id(), "gpt-4o-mini");

        // Stays set until an explicit reset.
        rt.activate_fallback_model();
        assert!(rt.fallback_model_active());

        rt.reset_for_tests();
        assert!(!rt.fallback_model_active());
        assert_eq!(rt.chat_model_id(), "gpt-4o");
    }

    #[test]
    fn test_admin_model_wins_over_fallback_flag() {
        let rt = RuntimeConfig::new(Settings::for_tests());
        rt.activate_fallback_model();
        rt.set_admin_override(None, Some("gpt-4".into()));
        assert_eq!(rt.chat_model_id(), "gpt-4");
    }
}
