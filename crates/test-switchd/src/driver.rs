//! Driver command surface of the simulated switch.
//!
//! [`DriverCommands`] maps each inbound command to the engine. The device is
//! selected by `Login`, which derives the mapping file for its address; every
//! mapping command before that fails with [`SwitchError::NoSession`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::MappingEngine;
use crate::error::{SwitchError, SwitchResult};
use crate::topology::{PortInventory, ResourceDescription, StaticInventory};

/// Suffix of the per-device mapping file.
pub const MAPPINGS_FILE_SUFFIX: &str = "-mappings.yaml";

/// State id reported when synchronization ids are not tracked.
pub const NO_STATE_ID: i64 = -1;

/// Returns the mapping file name for a device address.
///
/// Characters other than ASCII alphanumerics, `-` and `_` become `-`, so
/// `192.168.42.240` maps to `192-168-42-240-mappings.yaml`.
pub fn mapping_file_name(address: &str) -> String {
    let normalized: String = address
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}{}", normalized, MAPPINGS_FILE_SUFFIX)
}

/// Inbound driver command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    Login {
        address: String,
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    GetStateId,
    SetStateId {
        state_id: String,
    },
    MapBidirectional {
        src_port: String,
        dst_port: String,
    },
    MapUnidirectional {
        src_port: String,
        dst_ports: Vec<String>,
    },
    MapTap {
        src_port: String,
        dst_ports: Vec<String>,
    },
    MapClear {
        ports: Vec<String>,
    },
    MapClearTo {
        src_port: String,
        dst_ports: Vec<String>,
    },
    GetAttributeValue {
        address: String,
        attribute: String,
    },
    SetAttributeValue {
        address: String,
        attribute: String,
        value: String,
    },
    SetSpeedManual {
        src_port: String,
        dst_port: String,
        speed: String,
        duplex: String,
    },
    GetResourceDescription {
        address: String,
    },
}

impl Command {
    /// Protocol name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "Login",
            Command::GetStateId => "GetStateId",
            Command::SetStateId { .. } => "SetStateId",
            Command::MapBidirectional { .. } => "MapBidirectional",
            Command::MapUnidirectional { .. } => "MapUnidirectional",
            Command::MapTap { .. } => "MapTap",
            Command::MapClear { .. } => "MapClear",
            Command::MapClearTo { .. } => "MapClearTo",
            Command::GetAttributeValue { .. } => "GetAttributeValue",
            Command::SetAttributeValue { .. } => "SetAttributeValue",
            Command::SetSpeedManual { .. } => "SetSpeedManual",
            Command::GetResourceDescription { .. } => "GetResourceDescription",
        }
    }
}

/// Successful command result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    None,
    StateId(i64),
    AttributeValue(String),
    ResourceDescription(ResourceDescription),
}

/// Reply written for each command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandResponse {
    Ok {
        command: String,
        result: CommandOutput,
    },
    Error {
        command: String,
        kind: String,
        message: String,
    },
}

impl CommandResponse {
    /// Reply for a request line that could not be decoded.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Error {
            command: String::new(),
            kind: "BadRequest".to_string(),
            message: message.into(),
        }
    }

    /// Returns true for successful replies.
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandResponse::Ok { .. })
    }
}

#[derive(Debug, Clone)]
struct Session {
    address: String,
    mapping_file: PathBuf,
}

/// Command handler for one driver connection.
pub struct DriverCommands {
    engine: MappingEngine,
    inventory: Box<dyn PortInventory>,
    state_dir: PathBuf,
    session: Option<Session>,
}

impl DriverCommands {
    /// Creates a handler storing mapping files under `state_dir`.
    pub fn new(engine: MappingEngine, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            inventory: Box::new(StaticInventory::default()),
            state_dir: state_dir.into(),
            session: None,
        }
    }

    /// Replaces the port inventory used for auto-load.
    pub fn with_inventory(mut self, inventory: impl PortInventory + 'static) -> Self {
        self.inventory = Box::new(inventory);
        self
    }

    /// Returns the engine.
    pub fn engine(&self) -> &MappingEngine {
        &self.engine
    }

    /// Mapping file of the current session.
    pub fn mapping_file(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.mapping_file.as_path())
    }

    /// Device address of the current session.
    pub fn address(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.address.as_str())
    }

    fn session_file(&self, operation: &str) -> SwitchResult<&Path> {
        self.mapping_file().ok_or_else(|| SwitchError::NoSession {
            operation: operation.to_string(),
        })
    }

    /// Opens a session for `address`. Credentials are not checked.
    pub fn login(&mut self, address: &str, username: &str, _password: &str) -> SwitchResult<()> {
        let mapping_file = self.state_dir.join(mapping_file_name(address));
        info!(
            "Login to {} as '{}', mappings in {}",
            address,
            username,
            mapping_file.display()
        );
        self.session = Some(Session {
            address: address.to_string(),
            mapping_file,
        });
        Ok(())
    }

    pub fn get_state_id(&self) -> SwitchResult<i64> {
        Ok(NO_STATE_ID)
    }

    pub fn set_state_id(&self, state_id: &str) -> SwitchResult<()> {
        debug!("Ignoring state id {}", state_id);
        Ok(())
    }

    pub fn map_bidi(&self, src_port: &str, dst_port: &str) -> SwitchResult<()> {
        let path = self.session_file("MapBidirectional")?;
        self.engine.connect_bidirectional(path, src_port, dst_port)
    }

    pub fn map_uni(&self, src_port: &str, dst_ports: &[String]) -> SwitchResult<()> {
        let path = self.session_file("MapUnidirectional")?;
        self.engine.connect_unidirectional(path, src_port, dst_ports)
    }

    pub fn map_tap(&self, src_port: &str, dst_ports: &[String]) -> SwitchResult<()> {
        let path = self.session_file("MapTap")?;
        self.engine.connect_tap(path, src_port, dst_ports)
    }

    pub fn map_clear(&self, ports: &[String]) -> SwitchResult<()> {
        let path = self.session_file("MapClear")?;
        self.engine.disconnect(path, ports)
    }

    pub fn map_clear_to(&self, src_port: &str, dst_ports: &[String]) -> SwitchResult<()> {
        let path = self.session_file("MapClearTo")?;
        self.engine.disconnect_to(path, src_port, dst_ports)
    }

    /// Attribute reads have no backing state on the simulated device.
    pub fn get_attribute_value(&self, address: &str, attribute: &str) -> SwitchResult<String> {
        debug!("GetAttributeValue {} on {}", attribute, address);
        Err(SwitchError::not_implemented("GetAttributeValue"))
    }

    /// Confirms an attribute write by echoing the value back.
    pub fn set_attribute_value(
        &self,
        address: &str,
        attribute: &str,
        value: &str,
    ) -> SwitchResult<String> {
        debug!("SetAttributeValue {}={} on {}", attribute, value, address);
        Ok(value.to_string())
    }

    /// Legacy manual speed/duplex command, unsupported.
    pub fn set_speed_manual(&self) -> SwitchResult<()> {
        Err(SwitchError::not_implemented("SetSpeedManual"))
    }

    /// Auto-load: the resource tree of `address` with current connections.
    pub fn get_resource_description(&self, address: &str) -> SwitchResult<ResourceDescription> {
        let path = self.session_file("GetResourceDescription")?;
        self.engine
            .query_state(path, address, self.inventory.as_ref())
    }

    /// Executes one command.
    pub fn execute(&mut self, command: Command) -> SwitchResult<CommandOutput> {
        use CommandOutput as Out;

        match command {
            Command::Login {
                address,
                username,
                password,
            } => self.login(&address, &username, &password).map(|()| Out::None),
            Command::GetStateId => self.get_state_id().map(Out::StateId),
            Command::SetStateId { state_id } => self.set_state_id(&state_id).map(|()| Out::None),
            Command::MapBidirectional { src_port, dst_port } => {
                self.map_bidi(&src_port, &dst_port).map(|()| Out::None)
            }
            Command::MapUnidirectional {
                src_port,
                dst_ports,
            } => self.map_uni(&src_port, &dst_ports).map(|()| Out::None),
            Command::MapTap {
                src_port,
                dst_ports,
            } => self.map_tap(&src_port, &dst_ports).map(|()| Out::None),
            Command::MapClear { ports } => self.map_clear(&ports).map(|()| Out::None),
            Command::MapClearTo {
                src_port,
                dst_ports,
            } => self.map_clear_to(&src_port, &dst_ports).map(|()| Out::None),
            Command::GetAttributeValue { address, attribute } => self
                .get_attribute_value(&address, &attribute)
                .map(Out::AttributeValue),
            Command::SetAttributeValue {
                address,
                attribute,
                value,
            } => self
                .set_attribute_value(&address, &attribute, &value)
                .map(Out::AttributeValue),
            Command::SetSpeedManual { .. } => self.set_speed_manual().map(|()| Out::None),
            Command::GetResourceDescription { address } => self
                .get_resource_description(&address)
                .map(Out::ResourceDescription),
        }
    }

    /// Executes one command and wraps the outcome as a reply.
    pub fn handle(&mut self, command: Command) -> CommandResponse {
        let name = command.name().to_string();
        match self.execute(command) {
            Ok(result) => CommandResponse::Ok {
                command: name,
                result,
            },
            Err(e) => {
                warn!("{} failed: {}", name, e);
                CommandResponse::Error {
                    command: name,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }
}
