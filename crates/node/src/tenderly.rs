//! The Tenderly virtual network fork provider.

use std::time::{SystemTime, UNIX_EPOCH};

use cheatcalls_config::TenderlyConfiguration;
use cheatcalls_node_interaction::CheatcallDialect;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    ForkNode, ForkNodeError, ForkSpec,
    transport::{ResilientClient, TransportError},
};

/// A Tenderly virtual network created through the management API.
///
/// Only the admin RPC URL of the created network is retained. Stopping does not delete the
/// network, it is left to expire on Tenderly's side (or to be inspected after a failed run).
#[derive(Clone, Debug)]
pub struct TenderlyNode {
    configuration: TenderlyConfiguration,
    transport: ResilientClient,
    rpc_url: Option<String>,
}

impl TenderlyNode {
    const ADMIN_RPC: &str = "Admin RPC";
    const PUBLIC_RPC: &str = "Public RPC";
    const ACCESS_KEY_HEADER: &str = "X-Access-Key";
    const SLUG_PREFIX: &str = "cheatcalls-eip-tests";

    pub fn new(configuration: TenderlyConfiguration) -> Self {
        Self {
            configuration,
            transport: ResilientClient::default(),
            rpc_url: None,
        }
    }

    pub fn with_transport(mut self, transport: ResilientClient) -> Self {
        self.transport = transport;
        self
    }

    fn virtual_networks_url(&self, account: &str, project: &str) -> String {
        format!(
            "{}/api/v1/account/{account}/project/{project}/vnets",
            self.configuration.api_url
        )
    }

    /// A readable slug unique enough for concurrent test runs, the current time in milliseconds
    /// followed by a random suffix.
    fn unique_slug() -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{millis}-{}", Self::SLUG_PREFIX, &suffix[..8])
    }
}

impl ForkNode for TenderlyNode {
    const DIALECT: CheatcallDialect = CheatcallDialect::Tenderly;

    #[instrument(
        level = "info",
        skip_all,
        fields(
            origin_chain_id = spec.origin_chain_id,
            fork_block_number = spec.fork_block_number,
        ),
        err
    )]
    async fn start(&mut self, spec: ForkSpec) -> Result<(), ForkNodeError> {
        let TenderlyConfiguration {
            api_key: Some(api_key),
            account: Some(account),
            project: Some(project),
            ..
        } = &self.configuration
        else {
            return Err(ForkNodeError::MissingCredentials(
                "Tenderly API key, account and project",
            ));
        };

        let url = self.virtual_networks_url(account, project);
        let request = CreateVirtualNetworkRequest::new(Self::unique_slug(), spec);
        debug!(slug = %request.slug, "Creating virtual network");

        let response = self
            .transport
            .send(|client| {
                client
                    .post(&url)
                    .header(Self::ACCESS_KEY_HEADER, api_key)
                    .json(&request)
            })
            .await?;
        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;

        if !status.is_success() {
            return Err(ForkNodeError::SessionCreate {
                status: Some(status.as_u16()),
                body,
            });
        }

        let admin_rpc = serde_json::from_str::<CreatedVirtualNetwork>(&body)
            .ok()
            .and_then(|created| {
                created.rpc(Self::PUBLIC_RPC)?;
                created.rpc(Self::ADMIN_RPC).map(|rpc| rpc.url.clone())
            });
        let Some(admin_rpc) = admin_rpc else {
            return Err(ForkNodeError::SessionCreate {
                status: Some(status.as_u16()),
                body,
            });
        };

        info!(slug = %request.slug, rpc_url = %admin_rpc, "Created virtual network");
        self.rpc_url = Some(admin_rpc);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(rpc_url) = self.rpc_url.take() {
            debug!(%rpc_url, "Leaving the virtual network to expire");
        }
    }

    fn url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .expect("Tenderly virtual network is not started")
    }
}

/// The body of `POST .../vnets`. Sync and the public explorer are always disabled.
#[derive(Clone, Debug, Serialize)]
struct CreateVirtualNetworkRequest {
    slug: String,
    display_name: String,
    fork_config: ForkConfig,
    virtual_network_config: VirtualNetworkConfig,
    sync_state_config: SyncStateConfig,
    explorer_page_config: ExplorerPageConfig,
}

impl CreateVirtualNetworkRequest {
    fn new(slug: String, spec: ForkSpec) -> Self {
        Self {
            display_name: slug.clone(),
            slug,
            fork_config: ForkConfig {
                network_id: spec.origin_chain_id,
                block_number: spec.fork_block_number,
            },
            virtual_network_config: VirtualNetworkConfig {
                chain_config: ChainConfig {
                    chain_id: spec.fork_chain_id,
                },
            },
            sync_state_config: SyncStateConfig {
                enabled: false,
                commitment_level: "latest",
            },
            explorer_page_config: ExplorerPageConfig {
                enabled: false,
                verification_visibility: "bytecode",
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
struct ForkConfig {
    network_id: u64,
    block_number: u64,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct VirtualNetworkConfig {
    chain_config: ChainConfig,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct ChainConfig {
    chain_id: u64,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct SyncStateConfig {
    enabled: bool,
    commitment_level: &'static str,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct ExplorerPageConfig {
    enabled: bool,
    verification_visibility: &'static str,
}

#[derive(Clone, Debug, Deserialize)]
struct CreatedVirtualNetwork {
    rpcs: Vec<VirtualNetworkRpc>,
}

impl CreatedVirtualNetwork {
    fn rpc(&self, name: &str) -> Option<&VirtualNetworkRpc> {
        self.rpcs.iter().find(|rpc| rpc.name == name)
    }
}

#[derive(Clone, Debug, Deserialize)]
struct VirtualNetworkRpc {
    name: String,
    url: String,
}
