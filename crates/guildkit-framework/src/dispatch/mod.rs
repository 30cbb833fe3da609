//! Inbound event dispatch.
//!
//! [`handle_event`] is the single entry point for one inbound event.  For a
//! message it runs the command pipeline and the auto-response engine side by
//! side; for every event kind it runs the raw handlers registered for it.
//! The three paths are independent: a failure in one never affects the
//! others.

mod command;
mod raw;
mod response;

use std::sync::Arc;

use tracing::{Instrument, info_span};

use guildkit_core::RawEvent;

use crate::context::BotCore;

pub use command::{DispatchOutcome, dispatch_command};
pub use raw::run_raw_handlers;
pub use response::run_responses;

/// What one inbound event triggered.
#[derive(Debug)]
pub struct EventReport {
    /// Command pipeline outcome; `None` for non-message events.
    pub command: Option<DispatchOutcome>,
    /// Auto-responses fired.
    pub responses: usize,
    /// Raw handlers run.
    pub handlers: usize,
}

/// Dispatches one inbound event to every interested path.
pub async fn handle_event(core: &Arc<BotCore>, event: RawEvent) -> EventReport {
    let span = info_span!(
        "dispatch",
        kind = %event.kind(),
        guild = ?event.guild_id().map(|g| g.get()),
    );

    async {
        match event.as_message() {
            Some(message) => {
                let (command, responses, handlers) = tokio::join!(
                    dispatch_command(core, Arc::clone(message)),
                    run_responses(core, Arc::clone(message)),
                    run_raw_handlers(core, &event),
                );
                EventReport {
                    command: Some(command),
                    responses,
                    handlers,
                }
            }
            None => EventReport {
                command: None,
                responses: 0,
                handlers: run_raw_handlers(core, &event).await,
            },
        }
    }
    .instrument(span)
    .await
}
