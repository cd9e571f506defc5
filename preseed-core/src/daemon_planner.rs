//! Node-wide daemon settings
//!
//! Three independent questions: sharing the parent's id allocation when
//! nested without enough ids, the network listener of a standalone node,
//! and automatic refresh of cached images.

use tracing::{debug, info};

use crate::abstractions::{HostProbe, Prompter};
use crate::address::listener_address;
use crate::config::PlannerConfig;
use crate::error::PreseedResult;
use crate::types::InitConfig;
use crate::validation::validate_bind_address;

const SHARED_ALLOCATION_NOTICE: &str = "\
We detected that you are running inside an unprivileged container.
This means that unless you manually configured your host otherwise,
you will not have enough uids and gids to allocate to your containers.

Your containers can re-use this container's own allocation to avoid the
problem. Doing so makes nested containers slightly less safe as they could
in theory attack their parent container and gain more privileges than
they otherwise would.";

pub struct DaemonConfigPlanner<'a> {
    host: &'a dyn HostProbe,
    settings: &'a PlannerConfig,
}

impl<'a> DaemonConfigPlanner<'a> {
    pub fn new(host: &'a dyn HostProbe, settings: &'a PlannerConfig) -> Self {
        Self { host, settings }
    }

    pub fn plan(&self, config: &mut InitConfig, prompter: &mut dyn Prompter) -> PreseedResult<()> {
        self.plan_id_sharing(config, prompter)?;

        if config.cluster.is_standalone() {
            self.plan_listener(config, prompter)?;
        }

        if !prompter.ask_bool(
            "Would you like stale cached images to be updated automatically (yes/no) [default=yes]? ",
            true,
        )? {
            config
                .config
                .insert("images.auto_update_interval".to_string(), "0".to_string());
        }

        Ok(())
    }

    /// Whether nested containers cannot get their own id allocation
    fn lacks_id_allocation(&self) -> bool {
        if !self.host.running_in_user_namespace() {
            return false;
        }

        match self.host.idmap_capacity() {
            Ok(capacity) => !capacity.is_sufficient(),
            Err(e) => {
                debug!("No usable id map: {}", e);
                true
            }
        }
    }

    fn plan_id_sharing(&self, config: &mut InitConfig, prompter: &mut dyn Prompter) -> PreseedResult<()> {
        if !self.lacks_id_allocation() {
            return Ok(());
        }

        prompter.say(SHARED_ALLOCATION_NOTICE);
        if prompter.ask_bool(
            "Would you like to have your containers share their parent's allocation (yes/no) [default=yes]? ",
            true,
        )? {
            config
                .default_profile_mut()
                .config
                .insert("security.privileged".to_string(), "true".to_string());
        }

        Ok(())
    }

    fn plan_listener(&self, config: &mut InitConfig, prompter: &mut dyn Prompter) -> PreseedResult<()> {
        if !prompter.ask_bool(
            "Would you like the daemon to be available over the network (yes/no) [default=no]? ",
            false,
        )? {
            return Ok(());
        }

        let bind = prompter.ask_string(
            "Address to bind to (not including port) [default=all]: ",
            "all",
            Some(&validate_bind_address),
        )?;
        let default_port = self.settings.default_port;
        let port = prompter.ask_int(
            &format!("Port to bind to [default={}]: ", default_port),
            1,
            Some(i64::from(u16::MAX)),
            i64::from(default_port),
        )?;
        // ask_int enforced the 1..=65535 range
        let address = listener_address(&bind, port as u16)?;
        let password = prompter.ask_password("Trust password for new clients: ")?;

        info!("Daemon will listen on {}", address);
        config
            .config
            .insert("core.https_address".to_string(), address);
        config
            .config
            .insert("core.trust_password".to_string(), password);

        Ok(())
    }
}
