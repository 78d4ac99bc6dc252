//! Scheduled message delivery.
//!
//! Each pass claims due records one by one (pending -> sending) and turns
//! every claimed record into a live message. A record whose claim is lost
//! was cancelled or taken by another worker in the meantime and is left
//! alone. Failures are isolated per record and end in `failed`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::models::messages::{Message, ScheduledMessage};
use crate::store::{ScheduledMessageStore, UserStore};
use crate::utils::email::Notifier;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct MessageWorker {
    scheduled: Arc<dyn ScheduledMessageStore>,
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
}

impl MessageWorker {
    pub fn new(
        scheduled: Arc<dyn ScheduledMessageStore>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            scheduled,
            users,
            notifier,
            poll_interval,
        }
    }

    pub async fn process_scheduled_messages(&self, now: DateTime<Utc>) -> AppResult<WorkerReport> {
        let due = self.scheduled.list_due_scheduled_messages(now).await?;
        info!(checked = due.len(), at = %now, "checking scheduled messages");

        let mut report = WorkerReport::default();
        for scheduled in due {
            match self.scheduled.claim_scheduled_message(scheduled.id).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(id = %scheduled.id, error = %e, "failed to claim scheduled message");
                    report.skipped += 1;
                    continue;
                }
            }

            let message = Message::from_scheduled(&scheduled, now);
            match self
                .scheduled
                .deliver_scheduled_message(scheduled.id, message, now)
                .await
            {
                Ok(()) => {
                    report.delivered += 1;
                    info!(id = %scheduled.id, "sent scheduled message");
                    self.notify_receiver(&scheduled).await;
                }
                Err(e) => {
                    report.failed += 1;
                    error!(id = %scheduled.id, error = %e, "error sending scheduled message");
                    if let Err(mark_err) = self
                        .scheduled
                        .mark_scheduled_message_failed(scheduled.id, e.to_string())
                        .await
                    {
                        error!(id = %scheduled.id, error = %mark_err, "could not mark scheduled message failed");
                    }
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "processed scheduled messages"
        );
        Ok(report)
    }

    /// Polls until `shutdown` resolves. A failing pass is logged and the
    /// loop carries on.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(poll_interval_secs = self.poll_interval.as_secs(), "starting scheduled message worker");
        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.process_scheduled_messages(Utc::now()).await {
                error!(error = %e, "error in worker pass");
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("scheduled message worker stopped");
    }

    async fn notify_receiver(&self, scheduled: &ScheduledMessage) {
        let receiver = match self.users.find_user_by_id(scheduled.receiver_id).await {
            Ok(Some(receiver)) => receiver,
            Ok(None) => return,
            Err(e) => {
                warn!(id = %scheduled.id, error = %e, "could not load receiver for notification");
                return;
            }
        };
        if !receiver.email_notifications {
            return;
        }

        let sender_name = match self.users.find_user_by_id(scheduled.sender_id).await {
            Ok(Some(sender)) => sender.name,
            _ => "Your partner".to_string(),
        };

        match self
            .notifier
            .send_partner_message(&receiver.email, &sender_name, &scheduled.content)
            .await
        {
            Ok(()) => info!(to = %receiver.email, "sent email notification"),
            Err(e) => warn!(id = %scheduled.id, error = %e, "error sending email notification"),
        }
    }
}
