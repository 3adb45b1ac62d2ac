//! Device topology snapshot returned by auto-load.
//!
//! The port inventory is a fixed tree built from the device address; the
//! mapping state only decorates ports with the peer they are connected to.
//! Snapshots are rebuilt on every request and never persisted.

use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;

use l1_mapping_store::MappingSet;

/// Chassis model reported by the simulated device.
pub const CHASSIS_MODEL_NAME: &str = "Test Switch Chassis";

/// Serial number reported for every resource.
pub const SERIAL_NUMBER: &str = "NA";

/// Blade model reported by the simulated device.
pub const BLADE_MODEL_NAME: &str = "Generic L1 Module";

/// Port model reported by the simulated device.
pub const PORT_MODEL_NAME: &str = "Port Paired";

/// Blades in the default inventory.
pub const DEFAULT_BLADES: u32 = 2;

/// Ports per blade in the default inventory.
pub const DEFAULT_PORTS_PER_BLADE: u32 = 10;

/// Auto-load response: the device resource tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescription {
    pub chassis: Vec<Chassis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chassis {
    pub resource_id: u32,
    pub name: String,
    pub address: String,
    pub model_name: String,
    pub serial_number: String,
    pub blades: Vec<Blade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blade {
    pub resource_id: u32,
    pub name: String,
    pub address: String,
    pub model_name: String,
    pub serial_number: String,
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Port {
    pub resource_id: u32,
    pub name: String,
    pub address: String,
    pub model_name: String,
    pub serial_number: String,
    /// Address of the port this one is connected to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_to: Option<String>,
}

impl Chassis {
    /// Finds a port by its full address.
    pub fn port(&self, address: &str) -> Option<&Port> {
        self.ports().find(|p| p.address == address)
    }

    /// Iterates all ports across blades.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.blades.iter().flat_map(|b| b.ports.iter())
    }

    /// Records connections from `mappings` on the ports they name.
    ///
    /// For each `dst -> src` entry where both addresses are known ports, the
    /// `dst` port gets `src` as its peer. Exception values and addresses
    /// outside the inventory are skipped.
    pub fn attach_mappings(&mut self, mappings: &MappingSet) {
        let index: HashMap<String, (usize, usize)> = self
            .blades
            .iter()
            .enumerate()
            .flat_map(|(bi, blade)| {
                blade
                    .ports
                    .iter()
                    .enumerate()
                    .map(move |(pi, port)| (port.address.clone(), (bi, pi)))
            })
            .collect();

        for (dst, value) in mappings {
            let Some(src) = value.as_port() else {
                continue;
            };
            match (index.get(dst.as_str()), index.contains_key(src)) {
                (Some(&(bi, pi)), true) => {
                    self.blades[bi].ports[pi].mapped_to = Some(src.to_string());
                }
                _ => trace!(%dst, %src, "Skipping mapping outside inventory"),
            }
        }
    }
}

/// Source of the static resource tree for a device address.
pub trait PortInventory: Send + Sync {
    /// Builds the chassis tree for `address` with no connections attached.
    fn chassis(&self, address: &str) -> Chassis;
}

/// Fixed grid of blades and ports, the shape of the simulated test switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticInventory {
    pub blades: u32,
    pub ports_per_blade: u32,
}

impl StaticInventory {
    pub fn new(blades: u32, ports_per_blade: u32) -> Self {
        Self {
            blades,
            ports_per_blade,
        }
    }
}

impl Default for StaticInventory {
    fn default() -> Self {
        Self::new(DEFAULT_BLADES, DEFAULT_PORTS_PER_BLADE)
    }
}

impl PortInventory for StaticInventory {
    fn chassis(&self, address: &str) -> Chassis {
        let blades = (1..=self.blades)
            .map(|blade_id| {
                let blade_address = format!("{}/{}", address, blade_id);
                let ports = (1..=self.ports_per_blade)
                    .map(|port_id| Port {
                        resource_id: port_id,
                        name: format!("Port {:03}", port_id),
                        address: format!("{}/{}", blade_address, port_id),
                        model_name: PORT_MODEL_NAME.to_string(),
                        serial_number: SERIAL_NUMBER.to_string(),
                        mapped_to: None,
                    })
                    .collect();
                Blade {
                    resource_id: blade_id,
                    name: format!("Blade {}", blade_id),
                    address: blade_address,
                    model_name: BLADE_MODEL_NAME.to_string(),
                    serial_number: SERIAL_NUMBER.to_string(),
                    ports,
                }
            })
            .collect();

        Chassis {
            resource_id: 1,
            name: "Chassis 1".to_string(),
            address: address.to_string(),
            model_name: CHASSIS_MODEL_NAME.to_string(),
            serial_number: SERIAL_NUMBER.to_string(),
            blades,
        }
    }
}
