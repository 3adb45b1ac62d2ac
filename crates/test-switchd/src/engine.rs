//! MappingEngine - the connection management protocol over the store.
//!
//! Every mutating operation first sleeps for a random simulated hardware
//! latency, then runs inside one store transaction. Validation failures
//! abort the transaction, which restores the state read at its start.

use std::collections::BTreeSet;
use std::path::Path;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument};

use l1_mapping_store::{MappingSet, MappingStore, MappingValue};

use crate::config::EngineConfig;
use crate::error::{SwitchError, SwitchResult};
use crate::topology::{PortInventory, ResourceDescription};

/// Port cross-connect engine for one or more simulated devices.
///
/// The engine is stateless apart from its configuration; the store file
/// path selects the device for each call.
#[derive(Debug, Clone)]
pub struct MappingEngine {
    config: EngineConfig,
    store: MappingStore,
}

impl MappingEngine {
    /// Creates a new engine.
    pub fn new(config: EngineConfig, store: MappingStore) -> Self {
        Self { config, store }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Connects `src` and `dst` in both directions.
    ///
    /// Re-issuing an existing connection succeeds without changes.
    #[instrument(skip_all, fields(src = %src, dst = %dst))]
    pub fn connect_bidirectional(&self, path: &Path, src: &str, dst: &str) -> SwitchResult<()> {
        self.delay();
        self.store.transaction(path, |mappings| -> SwitchResult<()> {
            check_exception(src, mappings)?;
            check_exception(dst, mappings)?;
            self.check_mapping_exist(src, dst, mappings)?;
            self.check_mapping_exist(dst, src, mappings)?;
            mappings.insert(src, MappingValue::port(dst));
            mappings.insert(dst, MappingValue::port(src));
            Ok(())
        })?;

        info!("Mapped {} <-> {}", src, dst);
        Ok(())
    }

    /// Fans `src` out to every port in `dsts`.
    ///
    /// Destinations are processed in order; the first failing destination
    /// aborts the call and nothing from it is committed.
    #[instrument(skip_all, fields(src = %src, dsts = dsts.len()))]
    pub fn connect_unidirectional<S: AsRef<str>>(
        &self,
        path: &Path,
        src: &str,
        dsts: &[S],
    ) -> SwitchResult<()> {
        self.delay();
        self.store.transaction(path, |mappings| -> SwitchResult<()> {
            check_exception(src, mappings)?;
            for dst in dsts.iter().map(AsRef::as_ref) {
                check_exception(dst, mappings)?;
                self.check_mapping_exist(src, dst, mappings)?;
                mappings.insert(dst, MappingValue::port(src));
            }
            Ok(())
        })?;

        info!("Mapped {} -> {} destination(s)", src, dsts.len());
        Ok(())
    }

    /// Tap (monitor) fan-out; same policy as [`Self::connect_unidirectional`].
    pub fn connect_tap<S: AsRef<str>>(&self, path: &Path, src: &str, dsts: &[S]) -> SwitchResult<()> {
        self.connect_unidirectional(path, src, dsts)
    }

    /// Removes every mapping in which any of `ports` takes part.
    ///
    /// Naming one side of a bidirectional pair clears both directions, and
    /// naming a fan-out source clears all of its destinations. If any
    /// affected entry is exception-marked nothing is removed.
    #[instrument(skip_all, fields(ports = ports.len()))]
    pub fn disconnect<S: AsRef<str>>(&self, path: &Path, ports: &[S]) -> SwitchResult<()> {
        self.delay();
        let removed = self.store.transaction(path, |mappings| -> SwitchResult<usize> {
            let mut keys = BTreeSet::new();
            for port in ports.iter().map(AsRef::as_ref) {
                keys.extend(mappings.keys_referencing(port));
            }
            del_mappings(keys, mappings)
        })?;

        info!("Cleared {} mapping(s)", removed);
        Ok(())
    }

    /// Removes the mappings `dst -> src` for each listed destination.
    ///
    /// Destinations mapped to another source, or not mapped, are left alone.
    #[instrument(skip_all, fields(src = %src, dsts = dsts.len()))]
    pub fn disconnect_to<S: AsRef<str>>(
        &self,
        path: &Path,
        src: &str,
        dsts: &[S],
    ) -> SwitchResult<()> {
        self.delay();
        let removed = self.store.transaction(path, |mappings| -> SwitchResult<usize> {
            check_exception(src, mappings)?;
            let keys: Vec<String> = dsts
                .iter()
                .map(AsRef::as_ref)
                .filter(|dst| mappings.get(dst).map(MappingValue::as_str) == Some(src))
                .map(str::to_string)
                .collect();
            del_mappings(keys, mappings)
        })?;

        info!("Cleared {} mapping(s) from {}", removed, src);
        Ok(())
    }

    /// Builds the topology snapshot of `address` with current connections.
    #[instrument(skip(self, path, inventory))]
    pub fn query_state(
        &self,
        path: &Path,
        address: &str,
        inventory: &dyn PortInventory,
    ) -> SwitchResult<ResourceDescription> {
        let mappings = self.store.read(path)?;
        let mut chassis = inventory.chassis(address);
        chassis.attach_mappings(&mappings);

        debug!(entries = mappings.len(), "Built resource description");
        Ok(ResourceDescription {
            chassis: vec![chassis],
        })
    }

    /// Picks a simulated latency in seconds from the configured range.
    fn pick_delay(&self) -> u64 {
        let EngineConfig {
            delay_min,
            delay_max,
            ..
        } = self.config;
        if delay_max > delay_min {
            rand::thread_rng().gen_range(delay_min..=delay_max)
        } else {
            delay_min
        }
    }

    fn delay(&self) {
        let secs = self.pick_delay();
        debug!("Delay: {}", secs);
        if secs > 0 {
            thread::sleep(Duration::from_secs(secs));
        }
    }

    /// Rejects re-mapping `dst` away from a different source unless override
    /// is enabled.
    fn check_mapping_exist(&self, src: &str, dst: &str, mappings: &MappingSet) -> SwitchResult<()> {
        if self.config.override_mapping {
            return Ok(());
        }
        match mappings.get(dst) {
            Some(existing) if existing.as_str() != src => {
                Err(SwitchError::mapping_conflict(existing.as_str(), dst))
            }
            _ => Ok(()),
        }
    }
}

fn check_exception(port: &str, mappings: &MappingSet) -> SwitchResult<()> {
    match mappings.exception_for(port) {
        Some(marker) => Err(SwitchError::exception_port(port, marker)),
        None => Ok(()),
    }
}

/// Removes `keys` after verifying none is exception-marked.
fn del_mappings<I>(keys: I, mappings: &mut MappingSet) -> SwitchResult<usize>
where
    I: IntoIterator<Item = String>,
{
    let keys: Vec<String> = keys.into_iter().collect();
    for key in &keys {
        check_exception(key, mappings)?;
    }
    let mut removed = 0;
    for key in &keys {
        if mappings.remove(key).is_some() {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::StaticInventory;
    use l1_mapping_store::InMemoryLocker;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        engine: MappingEngine,
    }

    impl Fixture {
        fn new(override_mapping: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("dev-mappings.yaml");
            let config = EngineConfig {
                delay_min: 0,
                delay_max: 0,
                override_mapping,
            };
            let store = MappingStore::with_locker(Arc::new(InMemoryLocker::new()));
            Self {
                _dir: dir,
                path,
                engine: MappingEngine::new(config, store),
            }
        }

        fn seed(&self, content: &str) {
            std::fs::write(&self.path, content).unwrap();
        }

        fn state(&self) -> MappingSet {
            self.engine.store().read(&self.path).unwrap()
        }
    }

    fn set(entries: &[(&str, &str)]) -> MappingSet {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_bidirectional_creates_both_entries() {
        let fx = Fixture::new(false);
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();
        assert_eq!(fx.state(), set(&[("A", "B"), ("B", "A")]));
    }

    #[test]
    fn test_bidirectional_is_idempotent() {
        let fx = Fixture::new(false);
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();
        fx.engine.connect_bidirectional(&fx.path, "B", "A").unwrap();
        assert_eq!(fx.state(), set(&[("A", "B"), ("B", "A")]));
    }

    #[test]
    fn test_bidirectional_conflict_without_override() {
        let fx = Fixture::new(false);
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();

        let err = fx.engine.connect_bidirectional(&fx.path, "C", "B").unwrap_err();
        assert!(matches!(
            err,
            SwitchError::MappingConflict { ref existing_src, ref dst } if existing_src == "A" && dst == "B"
        ));

        // Reverse direction: A already points at B.
        let err = fx.engine.connect_bidirectional(&fx.path, "A", "D").unwrap_err();
        assert!(matches!(err, SwitchError::MappingConflict { .. }));
        assert_eq!(fx.state(), set(&[("A", "B"), ("B", "A")]));
    }

    #[test]
    fn test_bidirectional_override_replaces() {
        let fx = Fixture::new(true);
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();
        fx.engine.connect_bidirectional(&fx.path, "C", "B").unwrap();
        assert_eq!(fx.state(), set(&[("A", "B"), ("B", "C"), ("C", "B")]));
    }

    #[test]
    fn test_unidirectional_override_policy() {
        let fx = Fixture::new(false);
        fx.engine.connect_unidirectional(&fx.path, "S1", &["D"]).unwrap();

        let err = fx.engine.connect_unidirectional(&fx.path, "S2", &["D"]).unwrap_err();
        assert_eq!(err.kind(), "MappingConflict");
        assert_eq!(fx.state(), set(&[("D", "S1")]));

        let fx = Fixture::new(true);
        fx.engine.connect_unidirectional(&fx.path, "S1", &["D"]).unwrap();
        fx.engine.connect_unidirectional(&fx.path, "S2", &["D"]).unwrap();
        assert_eq!(fx.state(), set(&[("D", "S2")]));
    }

    #[test]
    fn test_unidirectional_failure_commits_nothing() {
        let fx = Fixture::new(false);
        fx.seed("C: X\n");

        let err = fx
            .engine
            .connect_unidirectional(&fx.path, "A", &["B", "C", "D"])
            .unwrap_err();
        assert!(matches!(err, SwitchError::MappingConflict { .. }));
        // B was set before C failed; rollback discards it.
        assert_eq!(fx.state(), set(&[("C", "X")]));
    }

    #[test]
    fn test_tap_is_unidirectional() {
        let fx = Fixture::new(false);
        fx.engine.connect_tap(&fx.path, "A", &["B", "C"]).unwrap();
        assert_eq!(fx.state(), set(&[("B", "A"), ("C", "A")]));
    }

    #[test]
    fn test_disconnect_source_clears_fan_out() {
        let fx = Fixture::new(false);
        fx.engine.connect_unidirectional(&fx.path, "A", &["B", "C"]).unwrap();
        assert_eq!(fx.state(), set(&[("B", "A"), ("C", "A")]));

        fx.engine.disconnect(&fx.path, &["A"]).unwrap();
        assert!(fx.state().is_empty());
    }

    #[test]
    fn test_disconnect_destinations_restores_empty() {
        let fx = Fixture::new(false);
        fx.engine.connect_unidirectional(&fx.path, "A", &["B", "C"]).unwrap();
        fx.engine.disconnect(&fx.path, &["B", "C"]).unwrap();
        assert!(fx.state().is_empty());
    }

    #[test]
    fn test_disconnect_one_side_of_pair() {
        let fx = Fixture::new(false);
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();
        fx.engine.connect_bidirectional(&fx.path, "C", "D").unwrap();

        fx.engine.disconnect(&fx.path, &["B"]).unwrap();
        assert_eq!(fx.state(), set(&[("C", "D"), ("D", "C")]));
    }

    #[test]
    fn test_disconnect_unknown_port_is_noop() {
        let fx = Fixture::new(false);
        fx.engine.connect_bidirectional(&fx.path, "A", "B").unwrap();
        fx.engine.disconnect(&fx.path, &["Z"]).unwrap();
        assert_eq!(fx.state().len(), 2);
    }

    #[test]
    fn test_disconnect_to_only_matching_source() {
        let fx = Fixture::new(false);
        fx.seed("B: A\nC: A\nD: X\n");

        fx.engine
            .disconnect_to(&fx.path, "A", &["B", "D", "missing"])
            .unwrap();
        assert_eq!(fx.state(), set(&[("C", "A"), ("D", "X")]));
    }

    #[test]
    fn test_exception_port_blocks_every_operation() {
        let fx = Fixture::new(true);
        let seeded = "P1: 'except: fiber fault'\nP2: P3\nP3: P2\n";
        fx.seed(seeded);
        let before = fx.state();

        let results = [
            fx.engine.connect_bidirectional(&fx.path, "P1", "P4"),
            fx.engine.connect_bidirectional(&fx.path, "P4", "P1"),
            fx.engine.connect_unidirectional(&fx.path, "P1", &["P4"]),
            fx.engine.connect_unidirectional(&fx.path, "P4", &["P5", "P1"]),
            fx.engine.disconnect(&fx.path, &["P2", "P1"]),
            fx.engine.disconnect_to(&fx.path, "P1", &["P2"]),
        ];
        for result in results {
            match result {
                Err(SwitchError::ExceptionPort { port, marker }) => {
                    assert_eq!(port, "P1");
                    assert_eq!(marker, "except: fiber fault");
                }
                other => panic!("expected ExceptionPort, got {:?}", other),
            }
        }

        assert_eq!(fx.state(), before);
    }

    #[test]
    fn test_disconnect_to_skips_unmatched_exception_destination() {
        let fx = Fixture::new(false);
        fx.seed("P1: 'except: fiber fault'\n");
        let before = fx.state();

        // P1 is not mapped to X, so it is never marked for removal.
        fx.engine.disconnect_to(&fx.path, "X", &["P1"]).unwrap();
        assert_eq!(fx.state(), before);
        assert_eq!(fx.state().exception_for("P1"), Some("except: fiber fault"));
    }

    #[test]
    fn test_unidirectional_duplicate_destinations() {
        let fx = Fixture::new(false);
        fx.engine
            .connect_unidirectional(&fx.path, "A", &["B", "B"])
            .unwrap();
        assert_eq!(fx.state(), set(&[("B", "A")]));
    }

    #[test]
    fn test_query_state_attaches_connections() {
        let fx = Fixture::new(false);
        let dev = "10.1.1.1";
        fx.engine
            .connect_bidirectional(&fx.path, "10.1.1.1/1/1", "10.1.1.1/2/1")
            .unwrap();
        fx.engine
            .connect_unidirectional(&fx.path, "10.1.1.1/1/5", &["10.1.1.1/1/6", "10.1.1.1/9/9"])
            .unwrap();

        let desc = fx
            .engine
            .query_state(&fx.path, dev, &StaticInventory::default())
            .unwrap();
        assert_eq!(desc.chassis.len(), 1);
        let chassis = &desc.chassis[0];
        let peer = |addr: &str| chassis.port(addr).and_then(|p| p.mapped_to.clone());

        assert_eq!(peer("10.1.1.1/1/1").as_deref(), Some("10.1.1.1/2/1"));
        assert_eq!(peer("10.1.1.1/2/1").as_deref(), Some("10.1.1.1/1/1"));
        assert_eq!(peer("10.1.1.1/1/6").as_deref(), Some("10.1.1.1/1/5"));
        assert_eq!(peer("10.1.1.1/1/5"), None);
    }

    #[test]
    fn test_pick_delay_within_range() {
        let fx = Fixture::new(false);
        let engine = MappingEngine::new(
            EngineConfig {
                delay_min: 2,
                delay_max: 5,
                override_mapping: false,
            },
            fx.engine.store().clone(),
        );
        for _ in 0..50 {
            let d = engine.pick_delay();
            assert!((2..=5).contains(&d));
        }
        assert_eq!(fx.engine.pick_delay(), 0);
    }
}
