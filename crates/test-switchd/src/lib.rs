//! Simulated layer-one matrix switch.
//!
//! This crate emulates the cross-connect logic of an L1 patch switch for
//! testing, with no hardware behind it. Connection state lives in one
//! mapping file per device (see `l1_mapping_store`).
//!
//! # Responsibilities
//!
//! - Bidirectional, unidirectional and tap port mappings
//! - Clearing mappings by port, or by source and destination
//! - Override and fault-injection (exception marker) policy
//! - Auto-load: the chassis/blade/port tree with current connections
//! - Simulated hardware latency
//!
//! # Commands
//!
//! | Command | Handler |
//! |---------|---------|
//! | Login | [`DriverCommands::login`] |
//! | GetStateId / SetStateId | [`DriverCommands::get_state_id`] / [`DriverCommands::set_state_id`] |
//! | MapBidirectional | [`MappingEngine::connect_bidirectional`] |
//! | MapUnidirectional / MapTap | [`MappingEngine::connect_unidirectional`] / [`MappingEngine::connect_tap`] |
//! | MapClear | [`MappingEngine::disconnect`] |
//! | MapClearTo | [`MappingEngine::disconnect_to`] |
//! | GetAttributeValue / SetAttributeValue | [`DriverCommands::get_attribute_value`] / [`DriverCommands::set_attribute_value`] |
//! | GetResourceDescription | [`MappingEngine::query_state`] |
//!
//! # Example
//!
//! ```ignore
//! use l1_test_switchd::{DriverCommands, MappingEngine, RuntimeConfig};
//! use l1_mapping_store::MappingStore;
//!
//! let config = RuntimeConfig::load_or_default("runtime_config.yml")?;
//! let engine = MappingEngine::new(config.engine(), MappingStore::new());
//! let mut driver = DriverCommands::new(engine, &config.state_dir);
//! driver.login("192.168.42.240", "admin", "admin")?;
//! driver.map_bidi("192.168.42.240/1/1", "192.168.42.240/1/2")?;
//! ```

pub mod config;
pub mod daemon;
pub mod driver;
pub mod engine;
pub mod error;
pub mod topology;

pub use config::{EngineConfig, RuntimeConfig, DEFAULT_CONFIG_FILE};
pub use driver::{mapping_file_name, Command, CommandOutput, CommandResponse, DriverCommands};
pub use engine::MappingEngine;
pub use error::{SwitchError, SwitchResult};
pub use topology::{Blade, Chassis, Port, PortInventory, ResourceDescription, StaticInventory};
