//! MAAS (Metal as a Service) integration settings

use tracing::info;

use crate::abstractions::{HostProbe, Prompter};
use crate::config::PlannerConfig;
use crate::error::PreseedResult;
use crate::types::InitConfig;
use crate::validation::non_empty;

pub struct MaasPlanner<'a> {
    host: &'a dyn HostProbe,
    settings: &'a PlannerConfig,
}

impl<'a> MaasPlanner<'a> {
    pub fn new(host: &'a dyn HostProbe, settings: &'a PlannerConfig) -> Self {
        Self { host, settings }
    }

    /// Returns whether a MAAS server was configured
    pub fn plan(&self, config: &mut InitConfig, prompter: &mut dyn Prompter) -> PreseedResult<bool> {
        if !prompter.ask_bool(
            "Would you like to connect to a MAAS server (yes/no) [default=no]? ",
            false,
        )? {
            return Ok(false);
        }

        let hostname = self
            .host
            .hostname()
            .unwrap_or_else(|_| self.settings.fallback_server_name.clone());

        let machine = prompter.ask_string(
            &format!("What's the name of this host in MAAS? [default={}]? ", hostname),
            &hostname,
            None,
        )?;
        if machine != hostname {
            config.config.insert("maas.machine".to_string(), machine);
        }

        let url = prompter.ask_string("What's the URL of your MAAS server? ", "", Some(&non_empty))?;
        let key = prompter.ask_string(
            "What's a valid API key for your MAAS server? ",
            "",
            Some(&non_empty),
        )?;
        info!("MAAS server configured at {}", url);

        config.config.insert("maas.api.url".to_string(), url);
        config.config.insert("maas.api.key".to_string(), key);

        Ok(true)
    }
}
