use crate::error::{Error, Result};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Pre-shared key check for inbound webhooks.
///
/// With no key configured every request passes (local development).
#[derive(Clone, Default)]
pub struct WebhookAuth {
    secret: Option<String>,
}

impl WebhookAuth {
    /// Empty or blank secrets disable the check. Any other secret is kept
    /// exactly as configured.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty()).map(str::to_string);
        match &secret {
            None => warn!("Webhook secret not configured, accepting unauthenticated webhooks"),
            Some(s) if s.trim().len() != s.len() => {
                warn!("Webhook secret has surrounding whitespace, it is compared verbatim");
            }
            Some(_) => {}
        }
        Self { secret }
    }

    /// Whether a key is required
    #[must_use]
    pub fn is_enforced(&self) -> bool {
        self.secret.is_some()
    }

    /// Compare the presented key byte for byte, in constant time.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when a key is configured and `provided` is absent or differs
    pub fn verify(&self, provided: Option<&str>) -> Result<()> {
        self.verify_bytes(provided.map(str::as_bytes))
    }

    /// [`Self::verify`] for raw header bytes
    ///
    /// # Errors
    ///
    /// Same as [`Self::verify`]
    pub fn verify_bytes(&self, provided: Option<&[u8]>) -> Result<()> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };
        let provided = provided.ok_or(Error::Unauthorized)?;
        let matches: bool = secret.as_bytes().ct_eq(provided).into();
        if matches {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }
}

impl std::fmt::Debug for WebhookAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookAuth")
            .field("enforced", &self.is_enforced())
            .finish()
    }
}
