//! Worker side of the TCP transport.

use super::mailbox::WorkerMailbox;
use super::protocol::{read_loop, write_loop};
use anyhow::Context;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Connects to the master, retrying up to `attempts` times while it is not
/// listening yet.
pub async fn connect(addr: &str, attempts: u32) -> anyhow::Result<WorkerMailbox> {
    let socket = dial(addr, attempts.max(1)).await?;
    socket.set_nodelay(true)?;
    info!("connected to master at {}", addr);

    let (reader, writer) = socket.into_split();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Err(e) = write_loop(writer, outbox_rx).await {
            warn!("send to master failed: {}", e);
        }
    });

    tokio::spawn(async move {
        // stops once the worker drops its inbox
        let result = read_loop(BufReader::new(reader), |msg| inbox_tx.send(msg).is_ok()).await;
        if let Err(e) = result {
            warn!("bad traffic from master: {}", e);
        }
        debug!("master link closed");
    });

    Ok(WorkerMailbox::new(inbox_rx, outbox_tx))
}

async fn dial(addr: &str, attempts: u32) -> anyhow::Result<TcpStream> {
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(socket) => return Ok(socket),
            Err(e) if attempt < attempts => {
                debug!("connect attempt {}/{} failed: {}", attempt, attempts, e);
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot reach master at {}", addr));
            }
        }
    }
}
