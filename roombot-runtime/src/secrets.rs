use anyhow::Context;

/// Where we store secrets in the OS keyring.
///
/// Kept constant so upgrades don't orphan a stored login.
const SERVICE: &str = "roombot";

pub const TOKEN_ENV: &str = "ROOMBOT_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    AuthToken,
}

impl SecretKey {
    fn user(self) -> &'static str {
        match self {
            SecretKey::AuthToken => "auth_token",
        }
    }
}

pub fn set_secret(key: SecretKey, value: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    entry.set_password(value).context("set secret")
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;

    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

pub fn delete_secret(key: SecretKey) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
    }
}

/// The bearer token for API calls: `ROOMBOT_TOKEN` first, then the keyring.
pub fn resolve_token() -> anyhow::Result<Option<String>> {
    pick_token(std::env::var(TOKEN_ENV).ok(), || {
        get_secret(SecretKey::AuthToken)
    })
}

fn pick_token(
    env: Option<String>,
    stored: impl FnOnce() -> anyhow::Result<Option<String>>,
) -> anyhow::Result<Option<String>> {
    if let Some(t) = env.filter(|t| !t.trim().is_empty()) {
        return Ok(Some(t.trim().to_string()));
    }
    Ok(stored()?.filter(|t| !t.trim().is_empty()))
}
