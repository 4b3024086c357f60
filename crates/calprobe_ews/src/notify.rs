// --- File: crates/calprobe_ews/src/notify.rs ---
//! Notification harness for the pull and streaming delivery models.
//!
//! Events reference changed items by id and kind only; anything more requires
//! re-fetching the item. Both observers run under a bounded overall wait and
//! release their subscription on every exit path, the timeout included.

use crate::session::Session;
use crate::HarnessError;
use calprobe_common::models::{
    Appointment, EventKind, FolderId, ItemEvent, PropertySet, PullCursor,
};
use calprobe_common::CalendarError;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Subscription lease requested from the server, in minutes.
const PULL_TIMEOUT_MINUTES: u32 = 1;

/// What an observer saw before it stopped.
#[derive(Debug, Default)]
pub struct ObservedEvents {
    pub events: Vec<ItemEvent>,
    /// Number of non-empty deliveries. More than one means the events did not
    /// all arrive at once.
    pub batches: usize,
}

/// Poll a pull subscription until `expected` events arrived.
///
/// Each iteration rebuilds the resumable cursor from the returned
/// `{subscription id, watermark, more-available}` triple; the watermark is
/// owned by this loop and resupplied on every call, which is how continuation
/// across polls is expressed. If the deadline elapses first, the observer
/// unsubscribes and fails with [`HarnessError::InsufficientEvents`] instead of
/// hanging.
pub async fn observe_pull(
    session: &Session,
    folders: &[FolderId],
    event_kinds: &[EventKind],
    expected: usize,
    poll_interval: Duration,
    deadline: Duration,
) -> Result<ObservedEvents, HarnessError> {
    let backend = session.backend();
    let info = session.info();

    let mut cursor = backend
        .subscribe_pull(info, folders, PULL_TIMEOUT_MINUTES, None, event_kinds)
        .await?;
    let subscription_id = cursor.subscription_id.clone();
    debug!(%subscription_id, "pull subscription opened");

    let mut observed = ObservedEvents::default();
    let outcome = tokio::time::timeout(deadline, async {
        loop {
            let batch = backend.get_events(info, &cursor).await?;
            if !batch.events.is_empty() {
                observed.batches += 1;
                observed.events.extend(batch.events);
            }

            cursor = PullCursor {
                subscription_id: subscription_id.clone(),
                watermark: batch.watermark,
                more_available: batch.more_available,
            };

            if observed.events.len() >= expected {
                return Ok::<(), CalendarError>(());
            }
            // Back off between polls unless the server says more is pending.
            if !cursor.more_available {
                tokio::time::sleep(poll_interval).await;
            }
        }
    })
    .await;

    if let Err(err) = backend.unsubscribe(info, &subscription_id).await {
        warn!(%subscription_id, "failed to unsubscribe: {err}");
    }

    match outcome {
        Ok(Ok(())) => Ok(observed),
        Ok(Err(err)) => Err(err.into()),
        Err(_elapsed) => Err(HarnessError::InsufficientEvents {
            expected,
            observed: observed.events.len(),
        }),
    }
}

/// Keep a streaming connection open until `expected` events arrived.
///
/// Inbound batches are forwarded from the connection callback into a channel;
/// the connection is closed and the subscription released on every exit path.
pub async fn observe_streaming(
    session: &Session,
    folders: &[FolderId],
    event_kinds: &[EventKind],
    expected: usize,
    deadline: Duration,
) -> Result<ObservedEvents, HarnessError> {
    let mut connection = session
        .backend()
        .subscribe_streaming(session.info(), folders, event_kinds)
        .await?;
    let subscription_id = connection.subscription_id().clone();
    debug!(%subscription_id, "streaming subscription opened");

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<ItemEvent>>();
    connection.set_on_event(Box::new(move |events| {
        let _ = tx.send(events.to_vec());
    }));
    connection.set_on_disconnect(Box::new(move || {
        debug!("streaming connection dropped by the server");
    }));
    connection.open()?;

    let mut observed = ObservedEvents::default();
    let _ = tokio::time::timeout(deadline, async {
        while observed.events.len() < expected {
            match rx.recv().await {
                Some(batch) => {
                    observed.batches += 1;
                    observed.events.extend(batch);
                }
                None => break,
            }
        }
    })
    .await;

    connection.close();
    if let Err(err) = session
        .backend()
        .unsubscribe(session.info(), &subscription_id)
        .await
    {
        warn!(%subscription_id, "failed to unsubscribe: {err}");
    }

    if observed.events.len() >= expected {
        Ok(observed)
    } else {
        Err(HarnessError::InsufficientEvents {
            expected,
            observed: observed.events.len(),
        })
    }
}

/// Re-fetch the items referenced by a run of events.
///
/// Raw events carry no payload beyond identity and kind, so correlation means
/// binding each referenced item. Ids that no longer resolve (the item was
/// deleted before the re-fetch) are skipped.
pub async fn fetch_event_items(
    session: &Session,
    events: &[ItemEvent],
    properties: &PropertySet,
) -> Result<Vec<Appointment>, HarnessError> {
    let mut items = Vec::with_capacity(events.len());
    for event in events {
        match session.get_appointment(&event.item_id, properties).await {
            Ok(item) => items.push(item),
            Err(HarnessError::Backend(CalendarError::NotFound(_))) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(items)
}
