//! Cluster membership questions
//!
//! Decides between a standalone node, the first node of a new cluster and
//! a node joining an existing cluster. Joining runs the trust handshake and
//! inherits the cluster's resources.

use tracing::info;

use crate::abstractions::{HostProbe, Prompter, RemoteConnector};
use crate::address::canonical_address;
use crate::config::PlannerConfig;
use crate::error::PreseedResult;
use crate::reconcile::ResourceReconciler;
use crate::trust::TrustNegotiator;
use crate::types::{BootstrapIntent, ClusterIntent, InitConfig, JoinIntent};
use crate::validation::validate_node_address;

/// Address proposed when the host has no routable address
const FALLBACK_ADDRESS: &str = "0.0.0.0";

pub struct ClusterPlanner<'a> {
    host: &'a dyn HostProbe,
    connector: &'a dyn RemoteConnector,
    settings: &'a PlannerConfig,
}

impl<'a> ClusterPlanner<'a> {
    pub fn new(
        host: &'a dyn HostProbe,
        connector: &'a dyn RemoteConnector,
        settings: &'a PlannerConfig,
    ) -> Self {
        Self {
            host,
            connector,
            settings,
        }
    }

    /// Resolve `config.cluster`; a join also installs the inherited resources
    pub async fn plan(&self, config: &mut InitConfig, prompter: &mut dyn Prompter) -> PreseedResult<()> {
        if !prompter.ask_bool("Would you like to use clustering? (yes/no) [default=no]: ", false)? {
            config.cluster = ClusterIntent::Standalone;
            return Ok(());
        }

        let hostname = self
            .host
            .hostname()
            .unwrap_or_else(|_| self.settings.fallback_server_name.clone());
        let server_name = prompter.ask_string(
            &format!(
                "What name should be used to identify this node in the cluster? [default={}]: ",
                hostname
            ),
            &hostname,
            None,
        )?;

        let default_address = self
            .host
            .default_address()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| FALLBACK_ADDRESS.to_string());
        let address = prompter.ask_string(
            &format!(
                "What IP address or DNS name should be used to reach this node? [default={}]: ",
                default_address
            ),
            &default_address,
            Some(&validate_node_address),
        )?;
        let address = canonical_address(&address, self.settings.default_port);
        config
            .config
            .insert("core.https_address".to_string(), address.clone());

        if prompter.ask_bool("Are you joining an existing cluster? (yes/no) [default=no]: ", false)? {
            let session = TrustNegotiator::new(self.connector, self.settings)
                .join(prompter)
                .await?;
            let resources = ResourceReconciler::new(session.client.as_ref())
                .fetch_and_filter(prompter)
                .await?;

            info!(
                "Node {} joining cluster via {}",
                server_name,
                session.remote.address()
            );
            config.install_join(JoinIntent::new(server_name, session.remote, resources));
            return Ok(());
        }

        info!("Node {} bootstrapping a new cluster at {}", server_name, address);
        config.cluster = ClusterIntent::Bootstrap(BootstrapIntent { server_name });

        if prompter.ask_bool(
            "Setup password authentication on the cluster? (yes/no) [default=yes]: ",
            true,
        )? {
            let password = prompter.ask_password("Trust password for new clients: ")?;
            config
                .config
                .insert("core.trust_password".to_string(), password);
        }

        Ok(())
    }
}
