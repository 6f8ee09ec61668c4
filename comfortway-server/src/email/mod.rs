//! Outbound mail channel

pub mod console;
pub mod smtp;

pub use console::ConsoleEmailSender;
pub use smtp::{SmtpConfig, SmtpEmailSender};

/// Trait for delivering sign-in links
pub trait EmailSender: Send + Sync {
    /// Send a passwordless sign-in link to an email address
    fn send_sign_in_link(&self, email: &str, link: &str) -> Result<(), String>;
}

/// Allow using Box<dyn EmailSender> as an EmailSender
impl EmailSender for Box<dyn EmailSender> {
    fn send_sign_in_link(&self, email: &str, link: &str) -> Result<(), String> {
        (**self).send_sign_in_link(email, link)
    }
}
