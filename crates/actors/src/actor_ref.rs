use tokio::sync::oneshot;

use crate::{
    actor::{Actor, ActorError},
    handler::{ActorMessage, Handler, Message},
    mailbox::{BoundedMailbox, Mailbox},
};

/// A clonable handle onto an actor's mailbox. The realtime-train collector
/// holds one `ActorRef<UpdaterActor>` and every server's cycle sends its
/// point-transition and removal requests through the same handle, `tell`
/// for fire-and-forget (spec §4.8 does not need a response) and `ask` where
/// a caller needs to wait for the write to land.
#[derive(Clone)]
pub struct ActorRef<A: Actor> {
    sender: BoundedMailbox<A>,
}

impl<A: Actor> ActorRef<A> {
    pub(crate) fn new(sender: BoundedMailbox<A>) -> Self {
        Self { sender }
    }

    pub async fn tell<M>(&self, msg: M) -> Result<(), ActorError<A, BoundedMailbox<A>>>
    where
        M: Message,
        A: Handler<M>,
    {
        let message = ActorMessage::<M, A>::new(msg, None);
        self.sender
            .send(message)
            .await
            .map_err(|why| ActorError::<A, BoundedMailbox<A>>::SendError(why))
    }

    pub async fn ask<M>(&self, msg: M) -> Result<M::Response, ActorError<A, BoundedMailbox<A>>>
    where
        M: Message,
        A: Handler<M>,
    {
        let (response_tx, response_rx) = oneshot::channel();
        let message = ActorMessage::<M, A>::new(msg, Some(response_tx));
        self.sender
            .send(message)
            .await
            .map_err(|why| ActorError::<A, BoundedMailbox<A>>::SendError(why))?;
        response_rx
            .await
            .map_err(|why| ActorError::ReceiveAnswerError(why))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    #[derive(Default)]
    struct SpeedTracker {
        last_speed_kmh: u32,
    }
    impl crate::Actor for SpeedTracker {}

    #[derive(Clone)]
    struct ReportSpeed(u32);
    impl crate::handler::Message for ReportSpeed {
        type Response = u32;
    }

    #[async_trait]
    impl crate::handler::Handler<ReportSpeed> for SpeedTracker {
        async fn handle(&mut self, message: ReportSpeed) -> u32 {
            self.last_speed_kmh = message.0;
            self.last_speed_kmh
        }
    }

    #[tokio::test]
    async fn ask_returns_the_handlers_response() {
        let actor_ref = crate::run(SpeedTracker::default);
        let reported = actor_ref.ask(ReportSpeed(87)).await.unwrap();
        assert_eq!(reported, 87);
    }

    #[tokio::test]
    async fn tell_does_not_wait_for_a_response() {
        let actor_ref = crate::run(SpeedTracker::default);
        actor_ref.tell(ReportSpeed(42)).await.unwrap();
        // a fire-and-forget send succeeding is all `tell` promises; the
        // updater's callers rely on this for removal requests with no
        // response to wait on.
    }
}
