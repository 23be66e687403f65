//! In-memory network and a small deterministic game for session tests

#![allow(dead_code)]

use rewind_core::{InputMap, InputSlot, ManualClock, ObjectPath, PeerId, Tick, Value, ValueMap};
use rewind_netcode::{
    Capabilities, InboundMessage, NetworkAdapter, SimulationObject, SyncConfig, SyncManager,
};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::rc::Rc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct InFlight {
    deliver_at: u64,
    to: PeerId,
    message: InboundMessage,
}

#[derive(Default)]
struct Wire {
    now: u64,
    latency: u64,
    in_flight: Vec<InFlight>,
    blocked: BTreeSet<(PeerId, PeerId)>,
    held: Vec<(PeerId, PeerId, InboundMessage)>,
}

/// Shared medium every [`LoopbackAdapter`] sends through
///
/// Time is counted in network steps; a message sent at step `n` is polled
/// from step `n + latency` on.
#[derive(Clone, Default)]
pub struct LoopbackNet {
    wire: Rc<RefCell<Wire>>,
}

impl LoopbackNet {
    pub fn new(latency: u64) -> Self {
        let net = Self::default();
        net.wire.borrow_mut().latency = latency;
        net
    }

    pub fn adapter(&self, id: PeerId) -> LoopbackAdapter {
        LoopbackAdapter {
            id,
            wire: self.wire.clone(),
        }
    }

    /// Advance network time by one step
    pub fn step(&self) {
        self.wire.borrow_mut().now += 1;
    }

    /// Messages sent to `to` that nobody has polled yet
    pub fn pending(&self, to: PeerId) -> usize {
        self.wire
            .borrow()
            .in_flight
            .iter()
            .filter(|m| m.to == to)
            .count()
    }

    /// Hold everything `from` sends to `to` until released
    pub fn block(&self, from: PeerId, to: PeerId) {
        self.wire.borrow_mut().blocked.insert((from, to));
    }

    /// Stop holding and hand back what was held, oldest first
    pub fn unblock(&self, from: PeerId, to: PeerId) -> Vec<InboundMessage> {
        let mut wire = self.wire.borrow_mut();
        wire.blocked.remove(&(from, to));
        let (taken, kept) = std::mem::take(&mut wire.held)
            .into_iter()
            .partition(|(f, t, _)| *f == from && *t == to);
        wire.held = kept;
        taken.into_iter().map(|(_, _, message)| message).collect()
    }
}

pub struct LoopbackAdapter {
    id: PeerId,
    wire: Rc<RefCell<Wire>>,
}

impl LoopbackAdapter {
    fn send(&mut self, to: PeerId, message: InboundMessage) {
        let mut wire = self.wire.borrow_mut();
        if wire.blocked.contains(&(self.id, to)) {
            wire.held.push((self.id, to, message));
            return;
        }
        let deliver_at = wire.now + wire.latency;
        wire.in_flight.push(InFlight {
            deliver_at,
            to,
            message,
        });
    }
}

impl NetworkAdapter for LoopbackAdapter {
    type Error = Infallible;

    fn send_input(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Infallible> {
        let message = InboundMessage::Input {
            from: self.id,
            bytes: bytes.to_vec(),
        };
        self.send(peer, message);
        Ok(())
    }

    fn send_ping(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Infallible> {
        let message = InboundMessage::Ping {
            from: self.id,
            bytes: bytes.to_vec(),
        };
        self.send(peer, message);
        Ok(())
    }

    fn send_ping_back(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Infallible> {
        let message = InboundMessage::PingBack {
            from: self.id,
            bytes: bytes.to_vec(),
        };
        self.send(peer, message);
        Ok(())
    }

    fn send_state(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Infallible> {
        let message = InboundMessage::State {
            from: self.id,
            bytes: bytes.to_vec(),
        };
        self.send(peer, message);
        Ok(())
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        let mut wire = self.wire.borrow_mut();
        let now = wire.now;
        let id = self.id;
        let (ready, waiting) = std::mem::take(&mut wire.in_flight)
            .into_iter()
            .partition(|m| m.to == id && m.deliver_at <= now);
        wire.in_flight = waiting;
        ready.into_iter().map(|m: InFlight| m.message).collect()
    }
}

/// Scripted input: the step a player takes on a given input tick
pub type Script = fn(i64) -> i64;

pub fn steady(_tick: i64) -> i64 {
    1
}

/// Still until tick 10, then moves by 3
pub fn turns_at_ten(tick: i64) -> i64 {
    if tick >= 10 {
        3
    } else {
        0
    }
}

pub fn zigzag(tick: i64) -> i64 {
    if (tick / 4) % 2 == 0 {
        2
    } else {
        -1
    }
}

/// One `interpolate_state` call as the player saw it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blend {
    pub from: i64,
    pub to: i64,
    pub weight: f32,
    pub shown: i64,
}

pub type BlendLog = Rc<RefCell<Vec<Blend>>>;

/// A player whose position mixes in every input it ever saw
///
/// Rendering moves `x` itself, like a scene node would, so a fixed step
/// that forgets to restore the saved state simulates from the wrong place.
pub struct Player {
    x: i64,
    generated: i64,
    script: Script,
    multiplier: i64,
    blends: Option<BlendLog>,
}

impl Player {
    pub fn new(script: Script) -> Self {
        Self {
            x: 1,
            generated: 0,
            script,
            multiplier: 31,
            blends: None,
        }
    }

    /// A player that writes down every blend it renders
    pub fn recording(script: Script, blends: BlendLog) -> Self {
        Self {
            blends: Some(blends),
            ..Self::new(script)
        }
    }

    /// A player that simulates differently from everyone else
    pub fn desynced(script: Script) -> Self {
        Self {
            multiplier: 37,
            ..Self::new(script)
        }
    }
}

impl SimulationObject for Player {
    fn network_tick(&mut self, _delta: f32, input: &InputMap) {
        let step = input.get(&InputSlot(0)).and_then(Value::as_int).unwrap_or(0);
        self.x = (self.x * self.multiplier + step).rem_euclid(1_000_003);
    }

    fn save_state(&self) -> ValueMap {
        let mut state = ValueMap::new();
        state.insert("x".into(), Value::Int(self.x));
        state
    }

    fn load_state(&mut self, state: &ValueMap) {
        self.x = state.get("x").and_then(Value::as_int).unwrap_or(0);
    }

    fn interpolate_state(&mut self, old: &ValueMap, new: &ValueMap, weight: f32) {
        let (Some(from), Some(to)) = (
            old.get("x").and_then(Value::as_int),
            new.get("x").and_then(Value::as_int),
        ) else {
            return;
        };
        self.x = Value::lerp(&Value::Int(from), &Value::Int(to), weight)
            .as_int()
            .unwrap_or(to);
        if let Some(blends) = &self.blends {
            blends.borrow_mut().push(Blend {
                from,
                to,
                weight,
                shown: self.x,
            });
        }
    }

    fn local_input(&mut self) -> InputMap {
        self.generated += 1;
        let mut input = InputMap::new();
        input.insert(InputSlot(0), Value::Int((self.script)(self.generated)));
        // metadata only, never hashed or predicted
        input.insert(InputSlot(-1), Value::Int(self.generated));
        input
    }
}

pub const HOST: PeerId = PeerId(1);
pub const CLIENT: PeerId = PeerId(2);

pub fn host_player() -> ObjectPath {
    ObjectPath::new("players/1")
}

pub fn client_player() -> ObjectPath {
    ObjectPath::new("players/2")
}

/// A stopped session for `local` with both players registered and the
/// other peer added
pub fn session(
    net: &LoopbackNet,
    config: SyncConfig,
    local: PeerId,
    host: Player,
    client: Player,
) -> SyncManager<LoopbackAdapter> {
    session_with_clock(net, config, local, ManualClock::new(0), host, client)
}

pub fn session_with_clock(
    net: &LoopbackNet,
    config: SyncConfig,
    local: PeerId,
    clock: ManualClock,
    host: Player,
    client: Player,
) -> SyncManager<LoopbackAdapter> {
    let mut sync = SyncManager::new(config, local, HOST, net.adapter(local), Box::new(clock))
        .expect("valid config");
    sync.register_object(host_player(), HOST, Capabilities::all(), Box::new(host))
        .expect("register host player");
    sync.register_object(client_player(), CLIENT, Capabilities::all(), Box::new(client))
        .expect("register client player");
    let other = if local == HOST { CLIENT } else { HOST };
    sync.add_peer(other).expect("add peer");
    sync
}

/// Hand a message straight to a session, bypassing its adapter
pub fn deliver(sync: &mut SyncManager<LoopbackAdapter>, message: InboundMessage) {
    let result = match message {
        InboundMessage::Input { from, bytes } => sync.receive_input(from, &bytes),
        InboundMessage::Ping { from, bytes } => sync.receive_ping(from, &bytes),
        InboundMessage::PingBack { from, bytes } => sync.receive_ping_back(from, &bytes),
        InboundMessage::State { from, bytes } => sync.receive_state(from, &bytes),
    };
    result.expect("delivered message applies");
}

/// One fixed step for each session, then one network step
pub fn step_all(net: &LoopbackNet, sessions: &mut [&mut SyncManager<LoopbackAdapter>]) {
    for sync in sessions.iter_mut() {
        sync.physics_step();
    }
    net.step();
}

/// Every tick confirmed on all sessions holds the same saved state
pub fn assert_same_states(sessions: &[&SyncManager<LoopbackAdapter>], min_ticks: usize) {
    let ticks = common_confirmed_ticks(sessions);
    assert!(
        ticks.clone().count() >= min_ticks,
        "only {:?} confirmed everywhere",
        ticks
    );
    for tick in ticks {
        let expected = &sessions[0].state_frame(tick).expect("state kept").data;
        for (i, sync) in sessions.iter().enumerate().skip(1) {
            let actual = &sync.state_frame(tick).expect("state kept").data;
            assert_eq!(actual, expected, "session {} differs at tick {}", i, tick);
        }
    }
}

/// Newest tick whose saved state can no longer change
pub fn confirmed_tick(sync: &SyncManager<LoopbackAdapter>) -> Tick {
    sync.peers()
        .map(|p| p.last_remote_tick_received)
        .min()
        .unwrap_or(sync.input_tick())
        .min(sync.current_tick())
}

/// Ticks whose confirmed state every session still holds
pub fn common_confirmed_ticks(
    sessions: &[&SyncManager<LoopbackAdapter>],
) -> std::ops::RangeInclusive<Tick> {
    let first = sessions
        .iter()
        .map(|s| s.state_stats().oldest_tick)
        .max()
        .unwrap_or(0);
    let last = sessions.iter().map(|s| confirmed_tick(s)).min().unwrap_or(-1);
    first..=last
}
