//! Once-a-minute reminder tick: fires every due reminder via FCM fan-out,
//! marks one-shot reminders sent, and advances recurring ones by
//! [`tom_core::model::Recurrence::advance`]. Built on the shared
//! [`tom_provider::cache::spawn_refresh_loop`] scaffolding instead of a
//! hand-rolled thread.

use crate::push::{fan_out, PushSender};
use crate::store::NotificationStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tom_core::error::Result;
use tom_core::model::Recurrence;

pub fn start(store: Arc<NotificationStore>, push: Arc<dyn PushSender>, interval: Duration) {
    tom_provider::cache::spawn_refresh_loop(interval, move || {
        let store = store.clone();
        let push = push.clone();
        async move { tick(&store, &*push).await }
    });
}

async fn tick(store: &NotificationStore, push: &dyn PushSender) -> Result<()> {
    let now = Utc::now();
    let due = store.due_reminders(now)?;
    for reminder in due {
        let tokens = store.android_tokens_for(&reminder.recipient)?;
        let title = if reminder.sender != reminder.recipient {
            format!("Message from {}", reminder.sender)
        } else {
            "Tom Reminder".to_string()
        };
        match fan_out(push, &tokens, &title, &reminder.message).await {
            Ok(()) => {
                if reminder.recurrence == Recurrence::None {
                    store.mark_sent(reminder.id)?;
                } else if let Some(next) = reminder.recurrence.advance(reminder.due_at) {
                    store.reschedule(reminder.id, next)?;
                    log::info!("recurring reminder {} rescheduled for {next}", reminder.id);
                } else {
                    store.mark_sent(reminder.id)?;
                }
            }
            Err(e) => {
                log::warn!("reminder {} push failed, left unsent for retry: {e}", reminder.id);
            }
        }
    }
    Ok(())
}
