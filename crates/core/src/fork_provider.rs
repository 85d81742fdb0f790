//! The fork provider selected by the configuration.

use alloy::providers::Provider;
use cheatcalls_config::{Arguments, ForkProviderKind};
use cheatcalls_node::{
    ForkNode, ForkNodeError, ForkSpec, anvil::AnvilNode, tenderly::TenderlyNode,
};
use cheatcalls_node_interaction::{CheatcallDialect, CheatcallsClient};

/// One of the supported fork providers, resolved once from the configuration.
#[derive(Debug)]
pub enum ForkProvider {
    Anvil(AnvilNode),
    Tenderly(TenderlyNode),
}

impl ForkProvider {
    pub fn new(arguments: &Arguments) -> anyhow::Result<Self> {
        Ok(match arguments.node {
            ForkProviderKind::Anvil => {
                Self::Anvil(AnvilNode::new(&arguments.anvil_configuration()?))
            }
            ForkProviderKind::Tenderly => {
                Self::Tenderly(TenderlyNode::new(arguments.tenderly_configuration()))
            }
        })
    }

    pub fn kind(&self) -> ForkProviderKind {
        match self {
            Self::Anvil(_) => ForkProviderKind::Anvil,
            Self::Tenderly(_) => ForkProviderKind::Tenderly,
        }
    }

    pub fn dialect(&self) -> CheatcallDialect {
        match self {
            Self::Anvil(_) => AnvilNode::DIALECT,
            Self::Tenderly(_) => TenderlyNode::DIALECT,
        }
    }

    pub fn quirks(&self) -> ProviderQuirks {
        ProviderQuirks::of(self.kind())
    }

    pub async fn start(&mut self, spec: ForkSpec) -> Result<(), ForkNodeError> {
        match self {
            Self::Anvil(node) => node.start(spec).await,
            Self::Tenderly(node) => node.start(spec).await,
        }
    }

    pub async fn stop(&mut self) {
        match self {
            Self::Anvil(node) => node.stop().await,
            Self::Tenderly(node) => node.stop().await,
        }
    }

    /// # Panics
    ///
    /// If the provider has not been started successfully.
    pub fn url(&self) -> &str {
        match self {
            Self::Anvil(node) => node.url(),
            Self::Tenderly(node) => node.url(),
        }
    }

    pub fn cheatcalls_client<P: Provider>(&self, provider: P) -> CheatcallsClient<P> {
        match self {
            Self::Anvil(node) => node.cheatcalls_client(provider),
            Self::Tenderly(node) => node.cheatcalls_client(provider),
        }
    }
}

/// Behavior that differs between fork providers and that tests have to account for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderQuirks {
    /// Whether the latest block right after the fork was created is the fork block itself.
    ///
    /// Tenderly mines an extra block stamped with the wall clock time when it creates a virtual
    /// network, so timestamps derived from the fork block are already in the past there.
    pub pins_next_block_timestamp: bool,
    /// Whether `setStorageAt` fails when the target account has no code.
    pub rejects_eoa_storage: bool,
}

impl ProviderQuirks {
    pub const fn of(kind: ForkProviderKind) -> Self {
        match kind {
            ForkProviderKind::Anvil => Self {
                pins_next_block_timestamp: true,
                rejects_eoa_storage: false,
            },
            ForkProviderKind::Tenderly => Self {
                pins_next_block_timestamp: false,
                rejects_eoa_storage: false,
            },
        }
    }
}
