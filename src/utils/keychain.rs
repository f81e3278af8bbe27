//! Secure API key storage using OS keychain
//!
//! This module provides secure storage for model-provider API keys using:
//! - Windows: Windows Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//! - macOS: macOS Keychain
//!
//! An environment variable always takes precedence over the keychain, so the
//! pipeline can run unattended (CI, containers) without an OS secret store.

use crate::error::{AppError, Result};
use keyring::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Keychain service name for Lead Scribe
const SERVICE_NAME: &str = "com.lead-scribe";

/// Keychain account for a provider's key (e.g., "llm_openai")
fn account(provider: &str) -> String {
    format!("llm_{}", provider)
}

/// Environment variable holding a provider's key (e.g., LEAD_SCRIBE_OPENAI_API_KEY)
pub fn env_var_name(provider: &str) -> String {
    format!("LEAD_SCRIBE_{}_API_KEY", provider.to_uppercase())
}

/// Trait for keychain operations - allows for mocking in tests
pub trait KeychainPort: Send + Sync {
    fn save_api_key(&self, provider: &str, api_key: &str) -> Result<()>;
    fn get_api_key(&self, provider: &str) -> Result<String>;
    fn delete_api_key(&self, provider: &str) -> Result<()>;
    fn has_api_key(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_ok()
    }
}

/// Keychain manager for secure API key storage using OS keychain
#[derive(Default)]
pub struct KeychainManager;

impl KeychainManager {
    /// Creates a new KeychainManager instance
    pub fn new() -> Self {
        Self
    }

    fn entry(provider: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &account(provider)).map_err(|e| AppError::Keychain(e.to_string()))
    }
}

impl KeychainPort for KeychainManager {
    fn save_api_key(&self, provider: &str, api_key: &str) -> Result<()> {
        Self::entry(provider)?
            .set_password(api_key)
            .map_err(|e| AppError::Keychain(format!("Failed to save API key: {}", e)))?;

        log::info!("API key saved for {}", provider);
        Ok(())
    }

    fn get_api_key(&self, provider: &str) -> Result<String> {
        Self::entry(provider)?
            .get_password()
            .map_err(|e| AppError::Keychain(format!("Failed to retrieve API key: {}", e)))
    }

    fn delete_api_key(&self, provider: &str) -> Result<()> {
        Self::entry(provider)?
            .delete_password()
            .map_err(|e| AppError::Keychain(format!("Failed to delete API key: {}", e)))?;

        log::info!("API key deleted for {}", provider);
        Ok(())
    }
}

/// Look up a provider's key: environment first, then the keychain.
///
/// Blank values count as missing.
pub fn resolve_api_key(provider: &str, keychain: &dyn KeychainPort) -> Option<String> {
    if let Ok(key) = std::env::var(env_var_name(provider)) {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }

    match keychain.get_api_key(provider) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        Ok(_) => None,
        Err(e) => {
            log::debug!("No keychain entry for {}: {}", provider, e);
            None
        }
    }
}

/// Mock keychain implementation for testing (in-memory storage)
#[derive(Clone, Default)]
pub struct MockKeychain {
    storage: Arc<Mutex<HashMap<String, String>>>,
}

impl MockKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.storage
            .lock()
            .map_err(|_| AppError::Keychain("mock keychain poisoned".to_string()))
    }
}

impl KeychainPort for MockKeychain {
    fn save_api_key(&self, provider: &str, api_key: &str) -> Result<()> {
        self.lock()?.insert(account(provider), api_key.to_string());
        Ok(())
    }

    fn get_api_key(&self, provider: &str) -> Result<String> {
        let key = account(provider);
        self.lock()?
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::Keychain(format!("API key not found for {}", key)))
    }

    fn delete_api_key(&self, provider: &str) -> Result<()> {
        self.lock()?.remove(&account(provider));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("openai"), "LEAD_SCRIBE_OPENAI_API_KEY");
        assert_eq!(env_var_name("groq"), "LEAD_SCRIBE_GROQ_API_KEY");
    }

    #[test]
    #[ignore] // Requires OS keychain access - skip in CI
    fn test_save_and_retrieve_api_key() {
        let manager = KeychainManager::new();
        let provider = "test_provider";
        let api_key = "test_api_key_12345";

        assert!(manager.save_api_key(provider, api_key).is_ok());
        assert_eq!(manager.get_api_key(provider).unwrap(), api_key);

        // Cleanup
        let _ = manager.delete_api_key(provider);
        assert!(!manager.has_api_key(provider));
    }

    #[test]
    fn test_mock_save_retrieve_delete() {
        let mock = MockKeychain::new();
        assert!(!mock.has_api_key("anthropic"));

        mock.save_api_key("anthropic", "old_key").unwrap();
        mock.save_api_key("anthropic", "new_key").unwrap();
        assert_eq!(mock.get_api_key("anthropic").unwrap(), "new_key");

        mock.delete_api_key("anthropic").unwrap();
        assert!(mock.get_api_key("anthropic").is_err());
    }

    #[test]
    fn test_resolve_prefers_environment() {
        // Provider names are unique per test so parallel tests never share a variable
        let mock = MockKeychain::new();
        mock.save_api_key("envfirst", "from_keychain").unwrap();
        std::env::set_var(env_var_name("envfirst"), "from_env");
        assert_eq!(resolve_api_key("envfirst", &mock).as_deref(), Some("from_env"));
        std::env::remove_var(env_var_name("envfirst"));
        assert_eq!(
            resolve_api_key("envfirst", &mock).as_deref(),
            Some("from_keychain")
        );
    }

    #[test]
    fn test_resolve_blank_is_missing() {
        let mock = MockKeychain::new();
        std::env::set_var(env_var_name("blankkey"), "   ");
        assert_eq!(resolve_api_key("blankkey", &mock), None);
        std::env::remove_var(env_var_name("blankkey"));
    }
}
