//! Remote Mailbox Bridge
//!
//! The protocol engine: one instance per remote node, draining a single
//! event queue and dispatching each event against the link table and the
//! current connection. The loop is the only reader and writer of the table,
//! so a dispatch step is atomic by construction: table mutation and the
//! control frame it implies happen before the next event is dequeued.
//!
//! The loop has two machine states, running and stopped. Everything else is
//! implicit in table content. It exits on the stop sentinel (clean) or on an
//! unrecoverable fault (cleanup, then the fault is returned to whatever
//! supervises the bridge; the bridge never restarts itself).

use crate::config::BridgeConfig;
use crate::connection::{ConnectionGuard, MessageSender};
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, EventObserver};
use crate::links::{LinkOutcome, LinkTable, UnlinkOutcome};
use crate::router::{Address, MailboxRouter};
use crate::wire::WireMessage;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};
use types::{AddressId, MailboxId, NodeId};

/// Whether the dispatch loop keeps running after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Cloneable producer half of a bridge's event queue.
///
/// Held by local senders, the transport's decode path and the mailbox
/// runtime. Enqueues never block; events from one producer are dispatched
/// in the order that producer enqueued them.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    remote_node: NodeId,
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl BridgeHandle {
    fn enqueue(&self, event: BridgeEvent) {
        // A closed queue means the bridge already stopped; by then every
        // watcher has been notified, so dropping the event is correct.
        if self.tx.send(event).is_err() {
            debug!(node = %self.remote_node, "event dropped, bridge is stopped");
        }
    }

    /// Queue an application payload for delivery to a mailbox on the peer.
    pub fn send_message(&self, target: MailboxId, payload: Bytes) {
        self.enqueue(BridgeEvent::Outgoing { target, payload });
    }

    /// Hand the bridge a frame decoded off the wire. Called by the
    /// transport's read half.
    pub fn deliver_peer_message(&self, message: WireMessage) {
        self.enqueue(BridgeEvent::Peer(message));
    }

    /// Subscribe `local` to the termination of the remote mailbox `remote`.
    pub fn link(&self, remote: MailboxId, local: MailboxId) {
        self.enqueue(BridgeEvent::Link { remote, local });
    }

    /// Cancel a previous [`BridgeHandle::link`].
    pub fn unlink(&self, remote: MailboxId, local: MailboxId) {
        self.enqueue(BridgeEvent::Unlink { remote, local });
    }

    /// Tell the bridge one of its watched local addresses terminated.
    /// Called by the mailbox runtime through the bridge's own address.
    pub fn notify_local_terminated(&self, id: AddressId) {
        self.enqueue(BridgeEvent::LocalTerminated(id));
    }

    /// Request a graceful stop. The sentinel takes its turn in the queue;
    /// events enqueued before it are still dispatched.
    pub fn stop(&self) {
        self.enqueue(BridgeEvent::Stop);
    }

    /// Diagnostic: make the loop fail with an unrecoverable fault.
    pub fn inject_fault(&self) {
        self.enqueue(BridgeEvent::InjectFault);
    }

    /// Diagnostic: terminate the currently bound sender from inside the loop.
    pub fn force_disconnect(&self) {
        self.enqueue(BridgeEvent::ForceDisconnect);
    }

    /// Install a one-shot observer invoked before each dequeue with the
    /// previously dispatched event. Returns `false` to uninstall itself.
    pub fn install_pre_receive_observer(
        &self,
        observer: impl FnMut(Option<&BridgeEvent>) -> bool + Send + Sync + 'static,
    ) {
        self.enqueue(BridgeEvent::InstallPreObserver(Some(Box::new(observer))));
    }

    /// Install a one-shot observer invoked right after each dequeue with the
    /// new event. Returns `false` to uninstall itself.
    pub fn install_post_receive_observer(
        &self,
        observer: impl FnMut(Option<&BridgeEvent>) -> bool + Send + Sync + 'static,
    ) {
        self.enqueue(BridgeEvent::InstallPostObserver(Some(Box::new(observer))));
    }
}

/// Per-peer protocol engine. See the crate docs for the data flow.
pub struct RemoteMailboxBridge {
    config: BridgeConfig,
    /// The bridge's own local address, registered as the watcher when a
    /// peer asks about one of our mailboxes.
    address: Address,
    guard: Arc<ConnectionGuard>,
    router: Arc<dyn MailboxRouter>,
    links: LinkTable,
    rx: mpsc::UnboundedReceiver<BridgeEvent>,
    pre_receive: Option<EventObserver>,
    post_receive: Option<EventObserver>,
    /// Last dispatched event, fed to the pre-receive observer.
    previous: Option<BridgeEvent>,
}

impl RemoteMailboxBridge {
    /// Build a bridge for the peer named in `config` together with the
    /// producer handle for its queue. `address` is the bridge's own mailbox
    /// address as allocated by the runtime; `guard` is shared with whatever
    /// binds and clears connections.
    ///
    /// The bridge itself keeps no handle: once every clone of the returned
    /// handle is gone, the loop drains what is queued and stops.
    pub fn new(
        config: BridgeConfig,
        address: Address,
        guard: Arc<ConnectionGuard>,
        router: Arc<dyn MailboxRouter>,
    ) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = BridgeHandle {
            remote_node: config.remote_node,
            tx,
        };
        let bridge = Self {
            config,
            address,
            guard,
            router,
            links: LinkTable::new(),
            rx,
            pre_receive: None,
            post_receive: None,
            previous: None,
        };
        (bridge, handle)
    }

    pub fn connection(&self) -> &Arc<ConnectionGuard> {
        &self.guard
    }

    pub fn remote_node(&self) -> NodeId {
        self.config.remote_node
    }

    /// Run the dispatch loop until the stop sentinel or a fatal fault.
    ///
    /// Cleanup runs on every exit path: remaining watchers are notified as
    /// if every watched remote mailbox died, and the table is reset. A fault
    /// additionally terminates the bound sender and is returned to the
    /// caller so a supervising layer can decide the node's fate.
    pub async fn run(mut self) -> Result<()> {
        debug!(node = %self.config.remote_node, "remote mailbox bridge running");

        let outcome = self.dispatch().await;

        // An abrupt bridge shutdown is, for watchers, the same as every
        // watched remote mailbox dying at once.
        self.notify_all_watchers();

        if let Err(fault) = &outcome {
            error!(
                node = %self.config.remote_node,
                error = %fault,
                "fatal fault while handling bridge events (this is a serious bug)"
            );
            if let Some(sender) = self.guard.current() {
                sender.terminate().await;
            }
        } else {
            debug!(node = %self.config.remote_node, "remote mailbox bridge stopped");
        }

        outcome
    }

    async fn dispatch(&mut self) -> Result<()> {
        loop {
            self.fire_pre_receive();

            let Some(mut event) = self.rx.recv().await else {
                // Every handle dropped: nothing can ever arrive again.
                debug!(node = %self.config.remote_node, "all handles dropped, stopping");
                return Ok(());
            };

            self.fire_post_receive(&event);

            if self.handle_event(&mut event).await? == Flow::Stop {
                return Ok(());
            }
            self.previous = Some(event);
        }
    }

    async fn handle_event(&mut self, event: &mut BridgeEvent) -> Result<Flow> {
        trace!(node = %self.config.remote_node, event = event.kind(), "dispatching");
        match event {
            BridgeEvent::Outgoing { target, payload } => {
                let frame = WireMessage::Application {
                    target: *target,
                    payload: payload.clone(),
                };
                // Failures are logged in send_to_peer; the message is
                // dropped, retry is the sender's concern.
                let _ = self.send_to_peer(&frame, "normal message").await;
            }

            BridgeEvent::Peer(message) => self.handle_peer_frame(message),

            BridgeEvent::Link { remote, local } => {
                self.handle_link(*remote, *local).await?;
            }

            BridgeEvent::Unlink { remote, local } => {
                self.handle_unlink(*remote, *local).await;
            }

            BridgeEvent::LocalTerminated(id) => match id {
                AddressId::Mailbox(terminated) => {
                    // We only hear about this mailbox because the peer
                    // registered interest in it.
                    let _ = self
                        .send_to_peer(
                            &WireMessage::MailboxTerminated(*terminated),
                            "mailbox terminated normally",
                        )
                        .await;
                }
                other => {
                    trace!(
                        node = %self.config.remote_node,
                        address = %other,
                        "termination notice for a non-mailbox address, dropping"
                    );
                }
            },

            BridgeEvent::Stop => {
                return Ok(Flow::Stop);
            }

            BridgeEvent::InjectFault => {
                return Err(BridgeError::FaultInjected);
            }

            BridgeEvent::ForceDisconnect => {
                if let Some(sender) = self.guard.current() {
                    sender.terminate().await;
                }
            }

            BridgeEvent::InstallPreObserver(observer) => {
                self.pre_receive = observer.take();
            }

            BridgeEvent::InstallPostObserver(observer) => {
                self.post_receive = observer.take();
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_peer_frame(&mut self, message: &WireMessage) {
        match message {
            WireMessage::Application { target, payload } => {
                trace!(
                    node = %self.config.remote_node,
                    target = %target,
                    bytes = payload.len(),
                    "delivering peer payload"
                );
                self.router.deliver(*target, payload.clone());
            }

            WireMessage::MailboxTerminated(remote) => {
                // A watched remote mailbox died; fan the notice out to every
                // subscribed local mailbox and drop the entry. Unknown ids
                // are a no-op (the entry may already be gone).
                let Some(watchers) = self.links.take_watchers(*remote) else {
                    return;
                };
                for local in watchers {
                    self.router.deliver_termination(local, *remote);
                }
            }

            WireMessage::NotifyOnTerminate(local) => {
                // The peer wants to hear about one of our mailboxes. Watch
                // it with our own address so the notice lands in this queue.
                self.router
                    .watch_termination(*local, self.address.clone());
            }

            WireMessage::RemoveNotifyOnTerminate(local) => {
                self.router.unwatch_termination(*local, &self.address);
            }

            other => {
                warn!(
                    node = %self.config.remote_node,
                    frame = other.description(),
                    "unexpected frame arrived in bridge mailbox"
                );
            }
        }
    }

    async fn handle_link(&mut self, remote: MailboxId, local: MailboxId) -> Result<()> {
        match self.links.link(remote, local) {
            LinkOutcome::AlreadyLinked | LinkOutcome::Added => Ok(()),
            LinkOutcome::FirstForRemote => {
                let frame = WireMessage::NotifyOnTerminate(remote);
                match self.send_to_peer(&frame, "termination notification").await {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        // The requester has no other way to learn that the
                        // subscription failed: treat the unreachable peer as
                        // if the watched mailbox were already gone, then
                        // escalate to a bridge-wide fault.
                        self.links.forget(remote);
                        self.router.deliver_termination(local, remote);
                        Err(BridgeError::link_registration_failed(remote, err))
                    }
                }
            }
        }
    }

    async fn handle_unlink(&mut self, remote: MailboxId, local: MailboxId) {
        match self.links.unlink(remote, local) {
            UnlinkOutcome::NotLinked | UnlinkOutcome::Removed => {}
            UnlinkOutcome::LastRemoved => {
                // Best effort: send_to_peer already logged any failure and
                // the peer-side registration dies with the connection anyway.
                let _ = self
                    .send_to_peer(
                        &WireMessage::RemoveNotifyOnTerminate(remote),
                        "remove notify node",
                    )
                    .await;
            }
        }
    }

    /// Forward a frame through the currently bound sender.
    ///
    /// Fails immediately with [`BridgeError::NoConnection`] when nothing is
    /// bound; no blocking, no retry. Send errors are logged with
    /// `description` and returned unchanged.
    pub(crate) async fn send_to_peer(
        &self,
        message: &WireMessage,
        description: &str,
    ) -> Result<()> {
        let Some(sender) = self.guard.current() else {
            error!(
                node = %self.config.remote_node,
                description,
                "could not send message, no connection"
            );
            return Err(BridgeError::no_connection(self.config.remote_node));
        };

        if let Err(err) = sender.send(message).await {
            error!(
                node = %self.config.remote_node,
                description,
                error = %err,
                "error sending message"
            );
            return Err(err);
        }
        Ok(())
    }

    fn fire_pre_receive(&mut self) {
        if let Some(mut observer) = self.pre_receive.take() {
            if observer(self.previous.as_ref()) {
                self.pre_receive = Some(observer);
            }
        }
    }

    fn fire_post_receive(&mut self, event: &BridgeEvent) {
        if let Some(mut observer) = self.post_receive.take() {
            if observer(Some(event)) {
                self.post_receive = Some(observer);
            }
        }
    }

    /// Shutdown step: every remaining watcher gets a termination notice for
    /// every remote id still tracked, then the table is reset.
    fn notify_all_watchers(&mut self) {
        for (remote, watchers) in self.links.drain() {
            for local in watchers {
                self.router.deliver_termination(local, remote);
            }
        }
    }
}
