use clap::{Parser, Subcommand};
use connect4_dist::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use connect4_dist::game::Game;
use connect4_dist::network::{client, local_cluster, server, Master, Worker, WorkerMailbox};
use connect4_dist::player::CpuPlayer;
use log::info;
use std::io;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(name = "connect4-dist", about = "Connect Four against a distributed CPU")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Colour the board output
    #[arg(long)]
    color: bool,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Play the game and coordinate the search
    #[command(alias = "coordinator")]
    Master {
        /// TCP workers to wait for
        #[arg(long)]
        workers: Option<usize>,

        /// In-process workers
        #[arg(long)]
        local_workers: Option<usize>,

        #[arg(long)]
        listen: Option<String>,

        #[arg(long)]
        max_depth: Option<u32>,

        /// Requeue tasks a worker has held longer than this
        #[arg(long)]
        task_timeout_ms: Option<u64>,
    },
    /// Evaluate tasks for a master
    #[command(alias = "evaluator")]
    Worker {
        #[arg(long)]
        connect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = EngineConfig::load_or_default(&cli.config);

    match cli.role {
        Role::Master {
            workers,
            local_workers,
            listen,
            max_depth,
            task_timeout_ms,
        } => {
            if let Some(n) = workers {
                config.cluster.workers = n;
            }
            if let Some(n) = local_workers {
                config.cluster.local_workers = n;
            }
            if let Some(addr) = listen {
                config.cluster.listen = addr;
            }
            if let Some(depth) = max_depth {
                config.search.max_depth = depth;
            }
            if task_timeout_ms.is_some() {
                config.search.task_timeout_ms = task_timeout_ms;
            }
            config.validate()?;
            run_master(&config, cli.color).await
        }
        Role::Worker { connect } => {
            let addr = connect.unwrap_or_else(|| config.cluster.listen.clone());
            let mailbox = client::connect(&addr, config.cluster.connect_attempts).await?;
            let done = Worker::new(mailbox).run().await?;
            info!("worker finished, {} tasks evaluated", done);
            Ok(())
        }
    }
}

async fn run_master(config: &EngineConfig, color: bool) -> anyhow::Result<()> {
    let cluster = &config.cluster;
    let mut local_handles = Vec::new();

    let mut cpu = if cluster.workers == 0 && cluster.local_workers == 0 {
        info!("no workers configured, searching locally");
        CpuPlayer::Local {
            max_depth: config.search.max_depth,
        }
    } else {
        let mailbox = if cluster.workers > 0 {
            if cluster.local_workers > 0 {
                anyhow::bail!("use either --workers or --local-workers, not both");
            }
            let listener = server::bind(&cluster.listen).await?;
            info!("waiting for {} workers", cluster.workers);
            server::accept_workers(&listener, cluster.workers).await?
        } else {
            let (mailbox, workers) = local_cluster(cluster.local_workers);
            local_handles = spawn_local(workers);
            mailbox
        };
        CpuPlayer::Cluster(Master::new(mailbox, config.master_config()))
    };

    let mut game = Game::new(config.new_board()).with_color(color);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    let outcome = game.play(&mut cpu, stdin, &mut stdout).await?;
    info!("result: {:?}", outcome);

    for handle in local_handles {
        handle.await??;
    }
    Ok(())
}

fn spawn_local(workers: Vec<WorkerMailbox>) -> Vec<JoinHandle<anyhow::Result<usize>>> {
    workers
        .into_iter()
        .map(|mailbox| tokio::spawn(Worker::new(mailbox).run()))
        .collect()
}
