//! Wizard driver
//!
//! Runs the planners in order against one [`InitConfig`]: cluster intent
//! first, then (unless joining) storage, MAAS, networking and daemon
//! settings. Nothing is submitted; the finished configuration is validated
//! and returned to the caller.

use tracing::info;

use crate::abstractions::{HostProbe, LocalInventory, Prompter, RemoteConnector};
use crate::cluster::ClusterPlanner;
use crate::config::PlannerConfig;
use crate::daemon_planner::DaemonConfigPlanner;
use crate::error::PreseedResult;
use crate::maas::MaasPlanner;
use crate::network_planner::NetworkPlanner;
use crate::storage_planner::{PoolRole, StoragePoolPlanner};
use crate::types::{ClusterIntent, InitConfig};

/// Collaborators shared by every planner
#[derive(Clone, Copy)]
pub struct PlannerContext<'a> {
    pub host: &'a dyn HostProbe,
    pub inventory: &'a dyn LocalInventory,
    pub connector: &'a dyn RemoteConnector,
    pub settings: &'a PlannerConfig,
}

pub struct ConfigAssembler<'a> {
    ctx: PlannerContext<'a>,
}

impl<'a> ConfigAssembler<'a> {
    pub fn new(ctx: PlannerContext<'a>) -> Self {
        Self { ctx }
    }

    /// Ask every question and return the validated configuration
    pub async fn run(&self, prompter: &mut dyn Prompter) -> PreseedResult<InitConfig> {
        let ctx = self.ctx;
        let mut config = InitConfig::new();

        ClusterPlanner::new(ctx.host, ctx.connector, ctx.settings)
            .plan(&mut config, prompter)
            .await?;

        if !config.cluster.is_join() {
            self.plan_storage(&mut config, prompter).await?;

            MaasPlanner::new(ctx.host, ctx.settings).plan(&mut config, prompter)?;

            NetworkPlanner::new(ctx.host, ctx.inventory, ctx.settings)
                .plan(&mut config, prompter)
                .await?;

            DaemonConfigPlanner::new(ctx.host, ctx.settings).plan(&mut config, prompter)?;
        }

        config.validate()?;
        info!(
            "Planned {} storage pools and {} networks",
            config.storage_pools.len(),
            config.networks.len()
        );

        if prompter.ask_bool(
            "Would you like a YAML preseed to be printed? (yes/no) [default=no]: ",
            false,
        )? {
            prompter.say(&config.to_yaml()?);
        }

        Ok(config)
    }

    async fn plan_storage(&self, config: &mut InitConfig, prompter: &mut dyn Prompter) -> PreseedResult<()> {
        let ctx = self.ctx;
        let planner = StoragePoolPlanner::new(ctx.host, ctx.inventory, ctx.settings);

        if let ClusterIntent::Bootstrap(_) = config.cluster {
            for role in [PoolRole::LocalInCluster, PoolRole::RemoteInCluster] {
                let question = format!(
                    "Do you want to configure a new {} storage pool? (yes/no) [default=yes]: ",
                    role
                );
                if prompter.ask_bool(&question, true)? {
                    planner.plan(role, config, prompter).await?;
                }
            }
            return Ok(());
        }

        if prompter.ask_bool(
            "Do you want to configure a new storage pool? (yes/no) [default=yes]: ",
            true,
        )? {
            planner.plan(PoolRole::Standalone, config, prompter).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::{MockHost, MockInventory, MockRemoteConnector, ScriptedPrompter};
    use crate::types::ROOT_DEVICE;

    #[tokio::test]
    async fn test_bootstrap_plans_local_and_remote_pools() {
        let host = MockHost::new().with_executable("ceph");
        let inventory = MockInventory::new();
        let connector = MockRemoteConnector::new();
        let settings = PlannerConfig::default();
        let ctx = PlannerContext {
            host: &host,
            inventory: &inventory,
            connector: &connector,
            settings: &settings,
        };

        let mut prompter = ScriptedPrompter::new([
            "yes", "", "", "no", "no", // bootstrap, no password
            "", // local pool: dir is the only local candidate
            "", "", "", "", "", // remote pool: new ceph pool with defaults
            "", // no MAAS
            "no", "no", // no networking
            "", // refresh images
            "", // no YAML
        ]);

        let config = ConfigAssembler::new(ctx).run(&mut prompter).await.unwrap();

        let names: Vec<_> = config
            .storage_pools
            .iter()
            .map(|p| (p.name.as_str(), p.driver.as_str()))
            .collect();
        assert_eq!(names, vec![("local", "dir"), ("remote", "ceph")]);
        assert_eq!(config.device(ROOT_DEVICE).unwrap()["pool"], "remote");
        assert!(!prompter.asked("available over the network"));
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_yaml_is_offered_and_printed() {
        let host = MockHost::new();
        let inventory = MockInventory::new();
        let connector = MockRemoteConnector::new();
        let settings = PlannerConfig::default();
        let ctx = PlannerContext {
            host: &host,
            inventory: &inventory,
            connector: &connector,
            settings: &settings,
        };

        let mut prompter =
            ScriptedPrompter::new(["", "no", "", "no", "no", "no", "", "yes"]);
        let config = ConfigAssembler::new(ctx).run(&mut prompter).await.unwrap();

        assert!(config.storage_pools.is_empty());
        let messages = prompter.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("config:"));
    }
}
