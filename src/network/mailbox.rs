//! Typed mailboxes for the two roles.
//!
//! Whatever the transport (in-process channels or TCP), the master sees one
//! inbox of [`Inbound`] events tagged with the sending worker and one outbox
//! per worker, and a worker sees one inbox and one outbox.

use super::protocol::NetMessage;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

pub type WorkerId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(WorkerId, NetMessage),
    Disconnected(WorkerId),
}

#[derive(Debug)]
pub struct MasterMailbox {
    inbox: mpsc::UnboundedReceiver<Inbound>,
    outboxes: BTreeMap<WorkerId, mpsc::UnboundedSender<NetMessage>>,
}

impl MasterMailbox {
    pub fn new(
        inbox: mpsc::UnboundedReceiver<Inbound>,
        outboxes: BTreeMap<WorkerId, mpsc::UnboundedSender<NetMessage>>,
    ) -> Self {
        Self { inbox, outboxes }
    }

    pub fn workers(&self) -> Vec<WorkerId> {
        self.outboxes.keys().copied().collect()
    }

    pub fn worker_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Sends to one worker. A worker whose outbox is closed is dropped from
    /// the roster and `false` is returned.
    pub fn send(&mut self, worker: WorkerId, msg: NetMessage) -> bool {
        let delivered = match self.outboxes.get(&worker) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        };
        if !delivered && self.outboxes.remove(&worker).is_some() {
            log::warn!("worker {} is gone, removing it", worker);
        }
        delivered
    }

    pub fn broadcast(&mut self, msg: NetMessage) {
        for worker in self.workers() {
            self.send(worker, msg.clone());
        }
    }

    pub fn remove(&mut self, worker: WorkerId) {
        self.outboxes.remove(&worker);
    }

    /// Next event from any worker. `None` once every worker link is closed.
    pub async fn recv(&mut self) -> Option<Inbound> {
        if self.outboxes.is_empty() {
            return None;
        }
        let event = self.inbox.recv().await;
        if event.is_none() {
            self.outboxes.clear();
        }
        event
    }
}

#[derive(Debug)]
pub struct WorkerMailbox {
    inbox: mpsc::UnboundedReceiver<NetMessage>,
    outbox: mpsc::UnboundedSender<NetMessage>,
}

impl WorkerMailbox {
    pub fn new(
        inbox: mpsc::UnboundedReceiver<NetMessage>,
        outbox: mpsc::UnboundedSender<NetMessage>,
    ) -> Self {
        Self { inbox, outbox }
    }

    /// Next message from the master. `None` once the master link is closed.
    pub async fn recv(&mut self) -> Option<NetMessage> {
        self.inbox.recv().await
    }

    pub fn send(&self, msg: NetMessage) -> anyhow::Result<()> {
        self.outbox
            .send(msg)
            .map_err(|_| anyhow::anyhow!("master link closed"))
    }
}

/// Wires a master and `workers` in-process workers over tokio channels.
///
/// Must be called inside a tokio runtime: one forwarding task per worker tags
/// its messages with the worker id and reports the disconnect once the
/// worker's mailbox is dropped.
pub fn local_cluster(workers: usize) -> (MasterMailbox, Vec<WorkerMailbox>) {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let mut outboxes = BTreeMap::new();
    let mut mailboxes = Vec::with_capacity(workers);

    for id in 0..workers {
        let (to_worker_tx, to_worker_rx) = mpsc::unbounded_channel();
        let (from_worker_tx, mut from_worker_rx) = mpsc::unbounded_channel();
        let inbox = inbox_tx.clone();

        tokio::spawn(async move {
            while let Some(msg) = from_worker_rx.recv().await {
                if inbox.send(Inbound::Message(id, msg)).is_err() {
                    return;
                }
            }
            let _ = inbox.send(Inbound::Disconnected(id));
        });

        outboxes.insert(id, to_worker_tx);
        mailboxes.push(WorkerMailbox::new(to_worker_rx, from_worker_tx));
    }

    (MasterMailbox::new(inbox_rx, outboxes), mailboxes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_cluster_tags_messages() {
        let (mut master, mut workers) = local_cluster(2);
        assert_eq!(master.workers(), vec![0, 1]);

        workers[1].send(NetMessage::TaskRequest { turn: 1 }).unwrap();
        assert_eq!(
            master.recv().await,
            Some(Inbound::Message(1, NetMessage::TaskRequest { turn: 1 }))
        );

        assert!(master.send(0, NetMessage::WorkDone { turn: 1 }));
        assert_eq!(
            workers[0].recv().await,
            Some(NetMessage::WorkDone { turn: 1 })
        );
    }

    #[tokio::test]
    async fn test_dropped_worker_reports_disconnect() {
        let (mut master, mut workers) = local_cluster(2);
        let gone = workers.remove(0);
        drop(gone);

        assert_eq!(master.recv().await, Some(Inbound::Disconnected(0)));
        assert!(!master.send(0, NetMessage::GameOver));
        assert_eq!(master.workers(), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_cluster_has_nothing_to_receive() {
        let (mut master, workers) = local_cluster(0);
        assert!(workers.is_empty());
        assert_eq!(master.worker_count(), 0);
        assert_eq!(master.recv().await, None);
    }
}
