use std::sync::Mutex;

use anyhow::anyhow;
use futures_util::future::BoxFuture;

use crate::utils::email::Notifier;

/// Notifier that remembers every recipient. `failing()` records and then errors.
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    partner_messages: Mutex<Vec<String>>,
    invitations: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn partner_messages(&self) -> Vec<String> {
        self.partner_messages.lock().unwrap().clone()
    }

    pub fn invitations(&self) -> Vec<String> {
        self.invitations.lock().unwrap().clone()
    }

    fn outcome(&self) -> anyhow::Result<()> {
        if self.fail {
            Err(anyhow!("smtp relay refused connection"))
        } else {
            Ok(())
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send_partner_message(
        &self,
        to_email: &str,
        _sender_name: &str,
        _content: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        self.partner_messages.lock().unwrap().push(to_email.to_string());
        let outcome = self.outcome();
        Box::pin(async move { outcome })
    }

    fn send_invitation(
        &self,
        to_email: &str,
        _sender_name: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        self.invitations.lock().unwrap().push(to_email.to_string());
        let outcome = self.outcome();
        Box::pin(async move { outcome })
    }
}
