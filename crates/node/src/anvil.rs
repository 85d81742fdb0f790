//! The local anvil fork provider.

use std::{
    fs::create_dir_all,
    net::{Ipv4Addr, TcpListener},
    path::PathBuf,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use anyhow::Context as _;
use cheatcalls_config::AnvilConfiguration;
use cheatcalls_node_interaction::CheatcallDialect;
use tracing::{debug, error, info, instrument};

use crate::{
    ForkNode, ForkNodeError, ForkSpec,
    constants::origin_chain_rpc_url_prefix,
    process::{LogLine, Process, ReadinessCheck},
};

static NODE_COUNT: AtomicU32 = AtomicU32::new(0);

/// A local anvil process forking the origin chain.
///
/// Every instance binds its own ephemeral port and logs to its own directory beneath the working
/// directory. The process is killed on [ForkNode::stop] and on drop.
#[derive(Debug)]
pub struct AnvilNode {
    id: u32,
    anvil: PathBuf,
    start_timeout: Duration,
    alchemy_api_key: Option<String>,
    logs_directory: PathBuf,
    rpc_url: Option<String>,
    handle: Option<Process>,
}

impl AnvilNode {
    const BASE_DIRECTORY: &str = "anvil";
    const LOGS_DIRECTORY: &str = "logs";

    const READY_MARKER: &str = "Listening on";
    const ERROR_MARKER: &str = "Error:";

    pub fn new(configuration: &AnvilConfiguration) -> Self {
        let id = NODE_COUNT.fetch_add(1, Ordering::SeqCst);
        let base_directory = configuration
            .working_directory
            .join(Self::BASE_DIRECTORY)
            .join(id.to_string());

        Self {
            id,
            anvil: configuration.path.clone(),
            start_timeout: configuration.start_timeout,
            alchemy_api_key: configuration.alchemy_api_key.clone(),
            logs_directory: base_directory.join(Self::LOGS_DIRECTORY),
            rpc_url: None,
            handle: None,
        }
    }

    /// Resolves the RPC URL of the chain to fork from.
    fn fork_url(&self, origin_chain_id: u64) -> Result<String, ForkNodeError> {
        let prefix =
            origin_chain_rpc_url_prefix(origin_chain_id).ok_or(ForkNodeError::UnsupportedOriginChain {
                chain_id: origin_chain_id,
            })?;
        let api_key = self
            .alchemy_api_key
            .as_deref()
            .ok_or(ForkNodeError::MissingCredentials("Alchemy API key"))?;
        Ok(format!("{prefix}{api_key}"))
    }

    /// Spawns anvil on `port` and waits for it to listen.
    fn spawn_process(
        anvil: PathBuf,
        logs_directory: PathBuf,
        start_timeout: Duration,
        fork_url: String,
        spec: ForkSpec,
        port: u16,
    ) -> anyhow::Result<Process> {
        create_dir_all(&logs_directory).context("Failed to create logs directory for anvil")?;

        Process::spawn(
            &anvil,
            &logs_directory,
            |command| {
                command
                    .arg("--host")
                    .arg(Ipv4Addr::LOCALHOST.to_string())
                    .arg("--port")
                    .arg(port.to_string())
                    .arg("--fork-url")
                    .arg(fork_url)
                    .arg("--fork-block-number")
                    .arg(spec.fork_block_number.to_string())
                    .arg("--chain-id")
                    .arg(spec.fork_chain_id.to_string());
            },
            ReadinessCheck {
                timeout: start_timeout,
                check: Box::new(|line: LogLine<'_>| match line {
                    LogLine::Stderr(line) if line.contains(Self::ERROR_MARKER) => {
                        anyhow::bail!("Failed to start anvil {line}")
                    }
                    LogLine::Stdout(line) => Ok(line.contains(Self::READY_MARKER)),
                    LogLine::Stderr(_) => Ok(false),
                }),
            },
        )
    }
}

impl ForkNode for AnvilNode {
    const DIALECT: CheatcallDialect = CheatcallDialect::Anvil;

    #[instrument(
        level = "info",
        skip_all,
        fields(anvil_node_id = self.id, origin_chain_id = spec.origin_chain_id),
        err
    )]
    async fn start(&mut self, spec: ForkSpec) -> Result<(), ForkNodeError> {
        let fork_url = self.fork_url(spec.origin_chain_id)?;
        let port = allocate_port()
            .context("Failed to allocate a port for anvil")
            .map_err(ForkNodeError::ProcessStart)?;
        debug!(port, "Allocated anvil port");

        let anvil = self.anvil.clone();
        let logs_directory = self.logs_directory.clone();
        let start_timeout = self.start_timeout;
        let process = tokio::task::spawn_blocking(move || {
            Self::spawn_process(anvil, logs_directory, start_timeout, fork_url, spec, port)
        })
        .await
        .context("The anvil spawning task panicked")
        .and_then(|result| result);

        match process {
            Ok(process) => {
                let rpc_url = format!("http://{}:{port}", Ipv4Addr::LOCALHOST);
                info!(%rpc_url, pid = process.id(), "Anvil fork is ready");
                self.handle = Some(process);
                self.rpc_url = Some(rpc_url);
                Ok(())
            }
            Err(err) => {
                error!(?err, "Failed to start anvil");
                Err(ForkNodeError::ProcessStart(err))
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(anvil_node_id = self.id))]
    async fn stop(&mut self) {
        self.rpc_url = None;
        if let Some(process) = self.handle.take() {
            info!(pid = process.id(), "Stopping anvil");
            drop(process);
        }
    }

    fn url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .expect("anvil node is not started")
    }
}

/// Finds a free local port by binding an ephemeral listener and releasing it right away.
///
/// Another process may claim the port before anvil binds it. Anvil then fails to start and the
/// error surfaces from [ForkNode::start].
pub fn allocate_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
