//! The realtime-event-updater's single-writer queue (spec §4.8, §9
//! "Polymorphic update request"). One actor, one mailbox: every point
//! transition, signal update and removal for every journey on every server
//! funnels through here and is applied strictly in arrival order, so two
//! concurrent realtime-train cycles can never interleave their writes to the
//! same journey's event list.

use async_trait::async_trait;
use std::sync::Arc;

use actors::actor::Actor;
use actors::handler::{Handler, Message};
use model::ids::JourneyId;
use reference::platform_signal::PlatformSignalProvider;

use platform::PlatformClient;
use realtime::UpdateRequest;

#[derive(Clone)]
pub struct UpdaterMessage {
    pub journey_id: JourneyId,
    pub request: UpdateRequest,
}

impl Message for UpdaterMessage {
    type Response = ();
}

#[derive(Clone)]
pub struct UpdaterActor {
    platform: PlatformClient,
    signals: Arc<dyn PlatformSignalProvider>,
}

impl UpdaterActor {
    pub fn new(platform: PlatformClient, signals: Arc<dyn PlatformSignalProvider>) -> Self {
        Self { platform, signals }
    }
}

impl Actor for UpdaterActor {}

#[async_trait]
impl Handler<UpdaterMessage> for UpdaterActor {
    async fn handle(&mut self, message: UpdaterMessage) {
        let mut events = match self.platform.db.events_for_journey(message.journey_id).await {
            Ok(events) if !events.is_empty() => events,
            Ok(_) => return,
            Err(why) => {
                tracing::error!(error = %why, "failed loading journey events for realtime update");
                return;
            }
        };

        realtime::apply(&mut events, &message.request, self.signals.as_ref()).await;

        if let Err(why) = self.platform.db.save_events_transactionally(&events).await {
            tracing::error!(error = %why, "failed persisting realtime event update");
        }
    }
}
