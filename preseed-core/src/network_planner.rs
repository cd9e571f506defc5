//! Networking for nodes that create their own networks
//!
//! Either a new managed bridge is planned, or the default profile's NIC is
//! bound to an interface that already exists on the host, or networking is
//! left alone entirely.

use tracing::{debug, info};

use crate::abstractions::{HostProbe, LocalInventory, Prompter};
use crate::config::PlannerConfig;
use crate::error::PreseedResult;
use crate::types::{device, ConfigMap, InitConfig, NetworkSpec, NIC_DEVICE};
use crate::validation::{
    accept_any, is_auto_or_none, validate_ipv4_setting, validate_ipv6_setting, validate_network_name,
};

/// How the default NIC reaches the host interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicType {
    Bridged,
    Macvlan,
}

impl NicType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NicType::Bridged => "bridged",
            NicType::Macvlan => "macvlan",
        }
    }
}

/// Default NIC attached to an interface that already exists on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBinding {
    pub parent: String,
    pub nictype: NicType,
    pub maas_subnet_ipv4: Option<String>,
    pub maas_subnet_ipv6: Option<String>,
}

impl InterfaceBinding {
    /// Device entry for the default profile
    pub fn to_device(&self) -> ConfigMap {
        let mut nic = device([
            ("type", "nic"),
            ("nictype", self.nictype.as_str()),
            ("name", NIC_DEVICE),
            ("parent", self.parent.as_str()),
        ]);
        if let Some(subnet) = &self.maas_subnet_ipv4 {
            nic.insert("maas.subnet.ipv4".to_string(), subnet.clone());
        }
        if let Some(subnet) = &self.maas_subnet_ipv6 {
            nic.insert("maas.subnet.ipv6".to_string(), subnet.clone());
        }
        nic
    }
}

/// Outcome of network planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkPlan {
    Bridge(NetworkSpec),
    ExistingInterface(InterfaceBinding),
    None,
}

/// One address family of a new bridge
struct AddressFamily {
    label: &'static str,
    prefix: &'static str,
    validate: fn(&str) -> Result<(), String>,
}

const IPV4: AddressFamily = AddressFamily {
    label: "IPv4",
    prefix: "ipv4",
    validate: validate_ipv4_setting,
};

const IPV6: AddressFamily = AddressFamily {
    label: "IPv6",
    prefix: "ipv6",
    validate: validate_ipv6_setting,
};

pub struct NetworkPlanner<'a> {
    host: &'a dyn HostProbe,
    inventory: &'a dyn LocalInventory,
    settings: &'a PlannerConfig,
}

impl<'a> NetworkPlanner<'a> {
    pub fn new(
        host: &'a dyn HostProbe,
        inventory: &'a dyn LocalInventory,
        settings: &'a PlannerConfig,
    ) -> Self {
        Self {
            host,
            inventory,
            settings,
        }
    }

    /// Ask for networking and apply the outcome to `config`
    pub async fn plan(
        &self,
        config: &mut InitConfig,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<NetworkPlan> {
        if !prompter.ask_bool(
            "Would you like to create a new network bridge (yes/no) [default=yes]? ",
            true,
        )? {
            if !prompter.ask_bool(
                "Would you like to use an existing bridge or host interface (yes/no) [default=no]? ",
                false,
            )? {
                debug!("No networking configured");
                return Ok(NetworkPlan::None);
            }

            let binding = self.bind_existing(config.maas_configured(), prompter)?;
            config.set_device(NIC_DEVICE, binding.to_device());
            info!("Default NIC bound to {} ({})", binding.parent, binding.nictype.as_str());
            return Ok(NetworkPlan::ExistingInterface(binding));
        }

        let bridge = self.plan_bridge(config, prompter).await?;
        config.set_device(
            NIC_DEVICE,
            device([
                ("type", "nic"),
                ("nictype", NicType::Bridged.as_str()),
                ("name", NIC_DEVICE),
                ("parent", bridge.name.as_str()),
            ]),
        );
        config.networks.push(bridge.clone());
        info!("Planned bridge {}", bridge.name);

        Ok(NetworkPlan::Bridge(bridge))
    }

    fn bind_existing(
        &self,
        maas_configured: bool,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<InterfaceBinding> {
        let parent = loop {
            let name = prompter.ask_string("Name of the existing bridge or host interface: ", "", None)?;
            if self.host.interface_exists(&name) {
                break name;
            }
            prompter.say("The requested interface doesn't exist. Please choose another one.");
        };

        let nictype = if self.host.interface_is_bridge(&parent) {
            NicType::Bridged
        } else {
            NicType::Macvlan
        };

        let mut binding = InterfaceBinding {
            parent,
            nictype,
            maas_subnet_ipv4: None,
            maas_subnet_ipv6: None,
        };

        if maas_configured
            && prompter.ask_bool(
                "Is this interface connected to your MAAS server? (yes/no) [default=yes]? ",
                true,
            )?
        {
            binding.maas_subnet_ipv4 = ask_optional(
                prompter,
                "What's the name of the MAAS IPv4 subnet for this interface (empty for no subnet)? ",
            )?;
            binding.maas_subnet_ipv6 = ask_optional(
                prompter,
                "What's the name of the MAAS IPv6 subnet for this interface (empty for no subnet)? ",
            )?;
        }

        Ok(binding)
    }

    // A failed lookup against the local daemon counts as a free name
    async fn exists_locally(&self, name: &str) -> bool {
        match self.inventory.network_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!("Network lookup for {} failed: {}", name, e);
                false
            }
        }
    }

    async fn plan_bridge(
        &self,
        config: &InitConfig,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<NetworkSpec> {
        let default = &self.settings.default_bridge;
        let question = format!("What should the new bridge be called [default={}]? ", default);

        let name = loop {
            let name = prompter.ask_string(&question, default, Some(&validate_network_name))?;
            if config.has_network(&name) || self.exists_locally(&name).await {
                prompter.say(&format!(
                    "The requested network bridge \"{}\" already exists. Please choose another name.",
                    name
                ));
                continue;
            }
            break name;
        };

        let mut bridge = NetworkSpec::bridge(name);
        for family in [IPV4, IPV6] {
            ask_address(&family, &mut bridge.config, prompter)?;
        }

        Ok(bridge)
    }
}

/// Ask the address of one family and, for a concrete subnet, whether to NAT
fn ask_address(
    family: &AddressFamily,
    config: &mut ConfigMap,
    prompter: &mut dyn Prompter,
) -> PreseedResult<()> {
    let question = format!(
        "What {} address should be used (CIDR subnet notation, \"auto\" or \"none\") [default=auto]? ",
        family.label
    );
    let address = prompter.ask_string(&question, "auto", Some(&family.validate))?;

    if !is_auto_or_none(&address) {
        let nat = prompter.ask_bool(
            &format!(
                "Would you like to NAT {} traffic on your bridge? [default=yes]? ",
                family.label
            ),
            true,
        )?;
        config.insert(format!("{}.nat", family.prefix), nat.to_string());
    }
    config.insert(format!("{}.address", family.prefix), address);

    Ok(())
}

fn ask_optional(prompter: &mut dyn Prompter, question: &str) -> PreseedResult<Option<String>> {
    let answer = prompter.ask_string(question, "", Some(&accept_any))?;
    Ok(Some(answer).filter(|value| !value.is_empty()))
}
