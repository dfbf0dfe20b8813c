//! User-visible texts and error classification
//!
//! Every string the user can see on the form or in the transcript comes from
//! here, so the front end and the tests agree on one source of truth.

use crate::gateway::{AuthReply, Credentials, GatewayError};
use thiserror::Error;

/// Seeded assistant turn at conversation start
pub const GREETING: &str =
    "Merhaba! Ben Eczacı AI, size yardımcı olabilirim. Hangi ilaç hakkında bilgi almak istersiniz?";

/// Assistant text when the server answered without an answer
pub const NO_ANSWER_FALLBACK: &str = "Üzgünüm, bir cevap oluşturamadım.";

/// Assistant text when the message exchange failed
pub const EXCHANGE_FAILED: &str = "Sunucuyla iletişim kurulurken bir hata oluştu. Lütfen arka plan servisinin çalıştığından emin olun.";

/// Form text when the credential exchange failed without a server detail
pub const AUTH_FAILED: &str = "Sunucu hatası oluştu, lütfen tekrar deneyin.";

/// Display name used when none is known
pub const DEFAULT_DISPLAY_NAME: &str = "Misafir";

/// Loading indicator shown while a request is pending
pub const THINKING: &str = "Yanıt düşünülüyor...";

/// Label above the citation list
pub const SOURCES_LABEL: &str = "Kaynaklar";

pub const MIN_PASSWORD_CHARS: usize = 6;

/// Local credential validation failure. Never reaches the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Kullanıcı adı boş bırakılamaz.")]
    BlankUsername,
    #[error("Şifre boş bırakılamaz.")]
    BlankPassword,
    #[error("Şifre en az 6 karakter olmalıdır.")]
    PasswordTooShort,
}

/// Check credentials before any network call
pub fn validate_credentials(credentials: &Credentials) -> Result<(), ValidationError> {
    if credentials.username.trim().is_empty() {
        return Err(ValidationError::BlankUsername);
    }
    if credentials.password.trim().is_empty() {
        return Err(ValidationError::BlankPassword);
    }
    if credentials.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Where a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Error line on the credential form
    CredentialForm,
    /// Substitute assistant turn in the transcript
    Transcript,
}

/// Map a gateway failure to the text shown on `surface`
pub fn user_message(surface: Surface, error: &GatewayError) -> String {
    match surface {
        Surface::CredentialForm => error
            .detail
            .clone()
            .unwrap_or_else(|| AUTH_FAILED.to_string()),
        Surface::Transcript => EXCHANGE_FAILED.to_string(),
    }
}

/// Classify a credential exchange outcome.
///
/// `Ok(is_elevated)` only for an explicit success; everything else becomes the
/// form error text.
pub fn classify_credential_outcome(
    outcome: &Result<AuthReply, GatewayError>,
) -> Result<bool, String> {
    match outcome {
        Ok(reply) if reply.success => Ok(reply.is_admin),
        Ok(_) => Err(AUTH_FAILED.to_string()),
        Err(e) => Err(user_message(Surface::CredentialForm, e)),
    }
}
