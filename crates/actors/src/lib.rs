use std::panic::AssertUnwindSafe;

use actor::{Actor, SupervisionStrategy};
use actor_ref::ActorRef;
use futures::FutureExt;
use mailbox::{bounded_mailbox, MailboxReceiver};

pub mod actor;
pub mod actor_ref;
pub mod handler;
pub mod mailbox;
pub mod worker_pool;

/// Creates and runs an actor. If the actor panics, it is either restarted,
/// resumed or stopped according to the strategy `Actor::on_fail()` returns.
/// This is the supervision primitive the single-writer realtime-event-updater
/// queue is built on.
pub fn run<A, F>(actor_factory: F) -> ActorRef<A>
where
    A: Actor,
    F: 'static + Send + Fn() -> A,
{
    let (tx, mut rx) = bounded_mailbox(32);
    let mut actor = actor_factory();
    let actor_ref = ActorRef::new(tx);

    tokio::spawn(async move {
        while let Some(mut message) = rx.recv().await {
            let result = AssertUnwindSafe(message.handle(&mut actor))
                .catch_unwind()
                .await;
            if let Err(why) = result {
                tracing::error!(?why, "actor panicked");
                match actor.on_fail(why) {
                    SupervisionStrategy::Restart => {
                        actor = actor_factory();
                    }
                    SupervisionStrategy::Resume => {}
                    SupervisionStrategy::Stop => {
                        break;
                    }
                };
            }
        }
    });

    actor_ref
}

/// Run an actor without supervision. This is not recommended.
pub fn run_unsupervised<A: Actor>(mut actor: A) -> ActorRef<A> {
    let (tx, mut rx) = bounded_mailbox(32);
    let actor_ref = ActorRef::new(tx);

    tokio::spawn(async move {
        while let Some(mut message) = rx.recv().await {
            message.handle(&mut actor).await;
        }
    });

    actor_ref
}
