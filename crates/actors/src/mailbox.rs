use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{handler::MessageHandler, Actor};

/// A channel to an actor's single consuming task. The realtime-event-updater
/// (spec §4.8) holds exactly one `BoundedMailbox` and every caller -- each
/// server's realtime-train collector cycle -- shares it, which is what
/// gives "writes to one journey's events never interleave" its guarantee.
#[async_trait]
pub trait Mailbox<A>
where
    A: Actor,
{
    type Error: Debug;

    async fn send<M>(&self, message: M) -> Result<(), Self::Error>
    where
        M: MessageHandler<A> + 'static;
}

#[async_trait]
pub trait MailboxReceiver<A>
where
    A: Actor,
{
    async fn recv(&mut self) -> Option<Box<dyn MessageHandler<A>>>
    where
        A: Actor;
}

#[derive(Clone)]
pub struct BoundedMailbox<A>(mpsc::Sender<Box<dyn MessageHandler<A>>>);

#[async_trait]
impl<A> Mailbox<A> for BoundedMailbox<A>
where
    A: Actor,
{
    type Error = mpsc::error::SendError<Box<dyn MessageHandler<A>>>;

    async fn send<M>(&self, message: M) -> Result<(), Self::Error>
    where
        M: MessageHandler<A> + 'static,
    {
        self.0.send(Box::new(message)).await?;
        Ok(())
    }
}

pub struct BoundedMailboxReceiver<A>(mpsc::Receiver<Box<dyn MessageHandler<A>>>);

#[async_trait]
impl<A> MailboxReceiver<A> for BoundedMailboxReceiver<A>
where
    A: Actor,
{
    async fn recv(&mut self) -> Option<Box<dyn MessageHandler<A>>>
    where
        A: Actor,
    {
        self.0.recv().await.map(|message| message)
    }
}

pub fn bounded_mailbox<A>(buffer: usize) -> (BoundedMailbox<A>, BoundedMailboxReceiver<A>)
where
    A: Actor,
{
    let (tx, rx) = mpsc::channel(buffer);
    (BoundedMailbox(tx), BoundedMailboxReceiver(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ActorMessage, Message};

    struct JourneyEventLog(Vec<u32>);
    impl Actor for JourneyEventLog {}

    #[derive(Clone)]
    struct AppendEventIndex(u32);
    impl Message for AppendEventIndex {
        type Response = ();
    }

    #[async_trait]
    impl crate::handler::Handler<AppendEventIndex> for JourneyEventLog {
        async fn handle(&mut self, message: AppendEventIndex) {
            self.0.push(message.0);
        }
    }

    #[tokio::test]
    async fn mailbox_preserves_arrival_order_for_one_journeys_events() {
        let (tx, mut rx) = bounded_mailbox::<JourneyEventLog>(8);
        for i in 0..5u32 {
            tx.send(ActorMessage::<AppendEventIndex, JourneyEventLog>::new(AppendEventIndex(i), None))
                .await
                .unwrap();
        }

        let mut actor = JourneyEventLog(Vec::new());
        for _ in 0..5 {
            let mut message = rx.recv().await.unwrap();
            message.handle(&mut actor).await;
        }
        assert_eq!(actor.0, vec![0, 1, 2, 3, 4]);
    }
}
