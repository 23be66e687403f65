//! Simulation objects and the registry the scheduler drives
//!
//! Objects are registered once with their owning peer and a set of
//! [`Capabilities`]. The registry keeps registration order: state is saved
//! in that order and `network_tick` runs in reverse, so objects registered
//! later (children, projectiles) tick before the objects that spawned them.

use crate::error::{Error, Result};
use bitflags::bitflags;
use rewind_core::{InputMap, InputPayload, ObjectPath, PeerId, Tick, ValueMap};
use rewind_rollback_buffer::{InputFrame, StateMap};

bitflags! {
    /// What the scheduler may ask of an object
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Produces local input and predicts remote input
        const INPUT = 1;
        /// Saves and loads state for rollback
        const STATEFUL = 1 << 1;
        /// Renders between two saved states
        const INTERPOLATED = 1 << 2;
    }
}

/// An object whose simulation is driven by the rollback scheduler
///
/// `network_tick` must be a deterministic function of the loaded state and
/// the given input.
pub trait SimulationObject {
    /// Advance one tick
    fn network_tick(&mut self, delta: f32, input: &InputMap);

    /// Snapshot of everything `network_tick` depends on
    fn save_state(&self) -> ValueMap {
        ValueMap::new()
    }

    /// Restore a snapshot taken by `save_state`
    fn load_state(&mut self, _state: &ValueMap) {}

    /// Show a blend of two snapshots (render only)
    fn interpolate_state(&mut self, _old: &ValueMap, _new: &ValueMap, _weight: f32) {}

    /// Input for the next tick, if this peer owns the object
    fn local_input(&mut self) -> InputMap {
        InputMap::new()
    }

    /// Guess the input of a remote owner from its last known input
    fn predict_input(&self, previous: &InputMap, _ticks_since_real_input: Tick) -> InputMap {
        previous.clone()
    }

    /// The session stopped
    fn sync_stopped(&mut self) {}
}

struct ObjectEntry {
    path: ObjectPath,
    owner: PeerId,
    capabilities: Capabilities,
    object: Box<dyn SimulationObject>,
}

/// Registered simulation objects, in registration order
#[derive(Default)]
pub struct ObjectRegistry {
    entries: Vec<ObjectEntry>,
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.path, e.owner, e.capabilities)))
            .finish()
    }
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object under `path`
    pub fn register(
        &mut self,
        path: ObjectPath,
        owner: PeerId,
        capabilities: Capabilities,
        object: Box<dyn SimulationObject>,
    ) -> Result<()> {
        if self.contains(&path) {
            return Err(Error::DuplicateObject(path.to_string()));
        }
        self.entries.push(ObjectEntry {
            path,
            owner,
            capabilities,
            object,
        });
        Ok(())
    }

    /// Remove an object
    pub fn unregister(&mut self, path: &ObjectPath) -> Option<Box<dyn SimulationObject>> {
        let index = self.entries.iter().position(|e| &e.path == path)?;
        Some(self.entries.remove(index).object)
    }

    /// Check if an object is registered
    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.entries.iter().any(|e| &e.path == path)
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered paths in registration order
    pub fn paths(&self) -> impl Iterator<Item = &ObjectPath> {
        self.entries.iter().map(|e| &e.path)
    }

    /// Owner of an object
    pub fn owner(&self, path: &ObjectPath) -> Option<PeerId> {
        self.entry(path).map(|e| e.owner)
    }

    /// Capabilities of an object
    pub fn capabilities(&self, path: &ObjectPath) -> Option<Capabilities> {
        self.entry(path).map(|e| e.capabilities)
    }

    /// Borrow an object
    pub fn get(&self, path: &ObjectPath) -> Option<&dyn SimulationObject> {
        self.entry(path).map(|e| e.object.as_ref())
    }

    /// Borrow an object mutably
    pub fn get_mut(&mut self, path: &ObjectPath) -> Option<&mut (dyn SimulationObject + 'static)> {
        self.entries
            .iter_mut()
            .find(|e| &e.path == path)
            .map(|e| e.object.as_mut())
    }

    fn entry(&self, path: &ObjectPath) -> Option<&ObjectEntry> {
        self.entries.iter().find(|e| &e.path == path)
    }

    /// Gather this tick's input from every input object `local` owns
    ///
    /// Objects with nothing to say are left out of the payload. The
    /// returned payload is sealed.
    pub fn collect_local_input(&mut self, local: PeerId) -> InputPayload {
        let mut payload = InputPayload::new();
        for entry in &mut self.entries {
            if entry.owner != local || !entry.capabilities.contains(Capabilities::INPUT) {
                continue;
            }
            let input = entry.object.local_input();
            if !input.is_empty() {
                payload.insert(entry.path.clone(), input);
            }
        }
        payload.sealed()
    }

    /// Predict `peer`'s input from its previous payload
    ///
    /// Only objects owned by `peer` and present in `previous` are predicted.
    /// Objects without the input capability repeat their previous input.
    /// Reserved slots never carry over. The returned payload is sealed.
    pub fn predict_input(
        &self,
        peer: PeerId,
        previous: Option<&InputPayload>,
        ticks_since_real_input: Tick,
    ) -> InputPayload {
        let mut payload = InputPayload::new();
        if let Some(previous) = previous {
            for entry in self.entries.iter().filter(|e| e.owner == peer) {
                let Some(last) = previous.public_input(&entry.path) else {
                    continue;
                };
                let predicted = if entry.capabilities.contains(Capabilities::INPUT) {
                    entry.object.predict_input(&last, ticks_since_real_input)
                } else {
                    last
                };
                if !predicted.is_empty() {
                    payload.insert(entry.path.clone(), predicted);
                }
            }
        }
        payload.sealed()
    }

    /// Run `network_tick` on every object, newest registration first
    pub fn network_tick(&mut self, delta: f32, frame: &InputFrame) {
        let empty = InputMap::new();
        for entry in self.entries.iter_mut().rev() {
            let input = frame
                .player_input(entry.owner)
                .and_then(|payload| payload.get(&entry.path))
                .unwrap_or(&empty);
            entry.object.network_tick(delta, input);
        }
    }

    /// Snapshot every stateful object
    pub fn save_state(&self) -> StateMap {
        self.entries
            .iter()
            .filter(|e| e.capabilities.contains(Capabilities::STATEFUL))
            .map(|e| (e.path.clone(), e.object.save_state()))
            .collect()
    }

    /// Restore a snapshot into the objects it names
    pub fn load_state(&mut self, state: &StateMap) {
        for (path, values) in state {
            match self.entries.iter_mut().find(|e| &e.path == path) {
                Some(entry) if entry.capabilities.contains(Capabilities::STATEFUL) => {
                    entry.object.load_state(values)
                }
                Some(_) => {}
                None => log::debug!("No object at {path} to restore state into"),
            }
        }
    }

    /// Tell every object the session stopped
    pub fn sync_stopped(&mut self) {
        for entry in &mut self.entries {
            entry.object.sync_stopped();
        }
    }

    /// Blend each interpolated object between its pair of snapshots
    pub fn interpolate<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = (&'a ObjectPath, &'a ValueMap, &'a ValueMap)>,
        weight: f32,
    ) {
        for (path, old, new) in pairs {
            if let Some(entry) = self.entries.iter_mut().find(|e| &e.path == path) {
                if entry.capabilities.contains(Capabilities::INTERPOLATED) {
                    entry.object.interpolate_state(old, new, weight);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::{InputSlot, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counter {
        value: i64,
        next_input: i64,
        log: Option<Rc<RefCell<Vec<String>>>>,
        name: &'static str,
    }

    impl SimulationObject for Counter {
        fn network_tick(&mut self, _delta: f32, input: &InputMap) {
            if let Some(step) = input.get(&InputSlot(0)).and_then(Value::as_int) {
                self.value += step;
            }
            if let Some(log) = &self.log {
                log.borrow_mut().push(self.name.to_string());
            }
        }

        fn save_state(&self) -> ValueMap {
            let mut state = ValueMap::new();
            state.insert("value".into(), Value::Int(self.value));
            state
        }

        fn load_state(&mut self, state: &ValueMap) {
            self.value = state.get("value").and_then(Value::as_int).unwrap_or(0);
        }

        fn local_input(&mut self) -> InputMap {
            let mut input = InputMap::new();
            if self.next_input != 0 {
                input.insert(InputSlot(0), Value::Int(self.next_input));
            }
            input
        }

        fn predict_input(&self, previous: &InputMap, ticks: Tick) -> InputMap {
            // decay to zero after a while
            if ticks > 3 {
                InputMap::new()
            } else {
                previous.clone()
            }
        }
    }

    fn all() -> Capabilities {
        Capabilities::INPUT | Capabilities::STATEFUL | Capabilities::INTERPOLATED
    }

    #[test]
    fn test_duplicate_path() {
        let mut registry = ObjectRegistry::new();
        registry
            .register("a".into(), PeerId(1), all(), Box::new(Counter::default()))
            .unwrap();
        let err = registry
            .register("a".into(), PeerId(1), all(), Box::new(Counter::default()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateObject(_)));
    }

    #[test]
    fn test_local_input_only_owned() {
        let mut registry = ObjectRegistry::new();
        let mine = Counter {
            next_input: 2,
            ..Default::default()
        };
        let theirs = Counter {
            next_input: 5,
            ..Default::default()
        };
        let idle = Counter::default();
        registry.register("mine".into(), PeerId(1), all(), Box::new(mine)).unwrap();
        registry.register("theirs".into(), PeerId(2), all(), Box::new(theirs)).unwrap();
        registry.register("idle".into(), PeerId(1), all(), Box::new(idle)).unwrap();

        let payload = registry.collect_local_input(PeerId(1));
        assert_eq!(payload.len(), 1);
        assert!(payload.contains(&"mine".into()));
        assert_eq!(payload.hash(), payload.clone().sealed().hash());
    }

    #[test]
    fn test_prediction() {
        let mut registry = ObjectRegistry::new();
        registry
            .register("theirs".into(), PeerId(2), all(), Box::new(Counter::default()))
            .unwrap();
        registry
            .register("plain".into(), PeerId(2), Capabilities::STATEFUL, Box::new(Counter::default()))
            .unwrap();

        let mut input = InputMap::new();
        input.insert(InputSlot(0), Value::Int(1));
        input.insert(InputSlot(-1), Value::Int(99));
        let mut previous = InputPayload::new();
        previous.insert("theirs".into(), input.clone());
        previous.insert("plain".into(), input);

        let predicted = registry.predict_input(PeerId(2), Some(&previous), 1);
        let theirs = predicted.get(&"theirs".into()).unwrap();
        assert_eq!(theirs.len(), 1);
        assert!(!theirs.contains_key(&InputSlot(-1)));
        assert!(predicted.contains(&"plain".into()));

        // hook decays input; plain object still repeats
        let stale = registry.predict_input(PeerId(2), Some(&previous), 10);
        assert!(!stale.contains(&"theirs".into()));
        assert!(stale.contains(&"plain".into()));

        assert!(registry.predict_input(PeerId(2), None, 1).is_empty());
        assert!(registry.predict_input(PeerId(3), Some(&previous), 1).is_empty());
    }

    #[test]
    fn test_network_tick_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ObjectRegistry::new();
        for name in ["first", "second", "third"] {
            let counter = Counter {
                name,
                log: Some(log.clone()),
                ..Default::default()
            };
            registry.register(name.into(), PeerId(1), all(), Box::new(counter)).unwrap();
        }

        registry.network_tick(1.0 / 60.0, &InputFrame::new(1));
        assert_eq!(*log.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_save_load() {
        let mut registry = ObjectRegistry::new();
        registry
            .register("a".into(), PeerId(1), all(), Box::new(Counter::default()))
            .unwrap();
        registry
            .register("render".into(), PeerId(1), Capabilities::INTERPOLATED, Box::new(Counter::default()))
            .unwrap();

        let mut frame = InputFrame::new(1);
        let mut input = InputMap::new();
        input.insert(InputSlot(0), Value::Int(3));
        let mut payload = InputPayload::new();
        payload.insert("a".into(), input);
        frame.set_real(PeerId(1), payload.sealed());

        let before = registry.save_state();
        assert_eq!(before.len(), 1);

        registry.network_tick(0.0, &frame);
        let after = registry.save_state();
        assert_eq!(after[&ObjectPath::new("a")]["value"], Value::Int(3));

        registry.load_state(&before);
        assert_eq!(registry.save_state(), before);
    }
}
