use core::fmt;
use std::any::Any;

use tokio::sync::oneshot;

use crate::mailbox::Mailbox;

#[derive(Debug, Clone)]
pub enum SupervisionStrategy {
    Restart,
    Resume,
    Stop,
}

/// A single-writer task reachable only through its mailbox. The realtime
/// event updater (spec §4.8) is the one actor in this system: its mailbox
/// is what guarantees two concurrent realtime-train collector cycles can
/// never interleave their writes to the same journey's event list.
pub trait Actor: Send + Sync + 'static {
    /// Called when a handler on the actor panics. The return value represents the
    /// supervision strategy used to handle the panic.
    /// NOTE: If this method panics, the actor can not recover from the panic.
    #[allow(unused_variables)]
    fn on_fail(&mut self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        SupervisionStrategy::Restart
    }
}

pub enum ActorError<A, M>
where
    A: Actor,
    M: Mailbox<A>,
{
    SendError(M::Error),
    ReceiveAnswerError(oneshot::error::RecvError),
}

impl<A, M> fmt::Debug for ActorError<A, M>
where
    A: Actor,
    M: Mailbox<A>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SendError(why) => write!(f, "SendError: {:?}", why),
            Self::ReceiveAnswerError(why) => write!(f, "ReceiveError: {:?}", why),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct JourneyWriterStub;
    impl Actor for JourneyWriterStub {}

    #[test]
    fn default_supervision_restarts_on_panic() {
        // Mirrors the real event-updater actor's own reliance on the
        // default strategy: a panic while applying one journey's update
        // should not leave the single-writer queue permanently wedged.
        let mut actor = JourneyWriterStub;
        let strategy = actor.on_fail(Box::new("event application panicked"));
        assert!(matches!(strategy, SupervisionStrategy::Restart));
    }
}
