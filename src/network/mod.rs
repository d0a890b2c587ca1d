pub mod client;
pub mod mailbox;
pub mod master;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod worker;

pub use mailbox::{local_cluster, MasterMailbox, WorkerId, WorkerMailbox};
pub use master::{Master, MasterConfig};
pub use worker::Worker;
