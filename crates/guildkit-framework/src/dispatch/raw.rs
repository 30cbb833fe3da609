//! Raw event handler dispatch.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{Instrument, debug, error, info_span};

use guildkit_core::RawEvent;

use crate::context::BotCore;

/// Invokes every handler registered for `event`'s kind, concurrently.
/// Returns how many ran.
pub async fn run_raw_handlers(core: &Arc<BotCore>, event: &RawEvent) -> usize {
    let kind = event.kind();
    let tables = core.registry().snapshot();
    let handlers = tables.handlers_for(kind).to_vec();
    drop(tables);

    if handlers.is_empty() {
        return 0;
    }

    let payload = event.payload();
    let mut tasks = Vec::with_capacity(handlers.len());
    let mut ran = Vec::with_capacity(handlers.len());

    for entry in &handlers {
        let Some(future) = (entry.descriptor.invoke)(Arc::clone(core), kind, Arc::clone(&payload)) else {
            // Shapes are checked at registration; this only trips if an
            // event carries a payload its kind does not declare.
            error!(
                extension = %entry.extension,
                handler = %entry.descriptor.name,
                kind = %kind,
                "Raw handler payload mismatch"
            );
            continue;
        };

        let span = info_span!(
            "raw_handler",
            extension = %entry.extension,
            handler = %entry.descriptor.name,
            kind = %kind,
        );
        let guard = Arc::clone(entry);
        tasks.push(tokio::spawn(
            async move {
                future.await;
                drop(guard);
            }
            .instrument(span),
        ));
        ran.push(entry);
    }

    let results = join_all(tasks).await;
    for (entry, result) in ran.iter().zip(results) {
        if let Err(e) = result {
            error!(
                extension = %entry.extension,
                handler = %entry.descriptor.name,
                error = %e,
                "Raw handler panicked"
            );
        }
    }

    debug!(kind = %kind, handlers = ran.len(), "Raw handlers dispatched");
    ran.len()
}
