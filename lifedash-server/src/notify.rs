//! Delivery of verification codes and reset tokens.

/// Sends codes and tokens to members.
pub trait Notifier: Send + Sync {
    fn send_email_code(&self, email: &str, code: &str);
    fn send_phone_code(&self, phone: &str, code: &str);
    fn send_reset_token(&self, email: &str, token: &str);
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_email_code(&self, email: &str, code: &str) {
        tracing::info!(%email, %code, "Email verification code");
    }

    fn send_phone_code(&self, phone: &str, code: &str) {
        tracing::info!(%phone, %code, "Phone verification code");
    }

    fn send_reset_token(&self, email: &str, token: &str) {
        tracing::info!(%email, %token, "Password reset token");
    }
}
