//! Master side of the TCP transport.

use super::mailbox::{Inbound, MasterMailbox, WorkerId};
use super::protocol::{read_loop, write_loop, NetMessage};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("master listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Waits for exactly `count` workers. Worker ids follow accept order.
pub async fn accept_workers(listener: &TcpListener, count: usize) -> anyhow::Result<MasterMailbox> {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let mut outboxes = BTreeMap::new();

    for id in 0..count {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        info!("worker {} connected from {} ({}/{})", id, peer, id + 1, count);
        outboxes.insert(id, attach(id, socket, inbox_tx.clone()));
    }

    Ok(MasterMailbox::new(inbox_rx, outboxes))
}

/// ソケットを受信箱・送信箱に接続する
fn attach(
    id: WorkerId,
    socket: TcpStream,
    inbox: mpsc::UnboundedSender<Inbound>,
) -> mpsc::UnboundedSender<NetMessage> {
    let (reader, writer) = socket.into_split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Err(e) = write_loop(writer, outbox_rx).await {
            warn!("worker {}: send failed: {}", id, e);
        }
    });

    tokio::spawn(async move {
        let result = read_loop(BufReader::new(reader), |msg| {
            inbox.send(Inbound::Message(id, msg)).is_ok()
        })
        .await;
        if let Err(e) = result {
            warn!("worker {}: bad traffic, dropping link: {}", id, e);
        }
        debug!("worker {} link closed", id);
        let _ = inbox.send(Inbound::Disconnected(id));
    });

    outbox_tx
}
