//! Console email sender for local development

use super::EmailSender;

/// Prints sign-in links instead of mailing them
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send_sign_in_link(&self, email: &str, link: &str) -> Result<(), String> {
        println!();
        println!("----------------------------------------");
        println!("  Sign-in link for {}", email);
        println!("  {}", link);
        println!("----------------------------------------");
        println!();

        tracing::info!(email = %email, link = %link, "Sign-in link issued");

        Ok(())
    }
}
