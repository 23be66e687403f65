//! The rollback scheduler
//!
//! [`SyncManager`] owns the adapter, the simulation objects and every
//! buffer of a session. It is driven by two calls:
//!
//! - [`physics_step`](SyncManager::physics_step) once per fixed tick: drains
//!   inbound messages, rolls back if needed, then holds, skips or advances
//! - [`render_step`](SyncManager::render_step) at render rate: polls the
//!   adapter and blends interpolated state, never touching the buffers
//!
//! # Tick cursors
//!
//! `input_tick` is the newest tick local input was generated for.
//! `current_tick` is the simulation cursor and trails it by
//! `input_delay`, so remote input for a tick usually arrives before the
//! tick is simulated. Ticks `<= 0` are never simulated; the state saved when
//! the cursor reaches tick 0 is the logical start of the session.
//!
//! # Step order
//!
//! ```text
//! drain messages ─▶ ping ─▶ rollback + replay ─▶ audit ─▶ record advantage
//!     ─▶ resync hold? ─▶ cleanup (lost sync hold?) ─▶ skip hold? ─▶ advance
//! ```
//!
//! Rollback runs before buffer cleanup so a state frame a pending rollback
//! needs is never retired first.

use crate::audit::StateAuditor;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::events::{EventQueue, SyncEvent, SyncObserver};
use crate::interpolation::Interpolator;
use crate::lag::LagTracker;
use crate::message::{encode_payload, InputMessage, PingMessage, StateMessage};
use crate::object::{Capabilities, ObjectRegistry, SimulationObject};
use crate::peer::Peer;
use crate::send_queue::SendQueue;
use crate::transport::{InboundMessage, NetworkAdapter};
use rewind_core::{
    hash_state, Clock, InputMap, InputPayload, ObjectPath, PeerId, Tick, DEFAULT_HASH_SEED,
};
use rewind_rollback_buffer::{BufferStats, InputFrame, StateFrame, TickWindow};
use std::time::Duration;

/// What one fixed step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The session is not running
    Idle,
    /// Holding during the grace period after sync was regained
    Resyncing { remaining: u32 },
    /// Holding because old state cannot be retired yet
    SyncLost { underruns: u32 },
    /// Holding so slower peers can catch up
    Skipping { remaining: u32 },
    /// Advanced one tick after replaying `rolled_back` ticks
    Advanced { tick: Tick, rolled_back: usize },
    /// The session was stopped by a fatal error
    Halted { reason: String },
}

/// Drives a rollback session
pub struct SyncManager<A: NetworkAdapter> {
    config: SyncConfig,
    local: PeerId,
    host: PeerId,
    adapter: A,
    clock: Box<dyn Clock>,
    objects: ObjectRegistry,
    peers: LagTracker,

    input_window: TickWindow<InputFrame>,
    state_window: TickWindow<StateFrame>,
    send_queue: SendQueue,
    auditor: StateAuditor,
    interpolator: Interpolator,
    events: EventQueue,
    inbound: Vec<InboundMessage>,

    started: bool,
    input_tick: Tick,
    current_tick: Tick,
    skip_ticks: u32,
    rollback_ticks: usize,
    input_buffer_underruns: i64,
    last_ping_sent: Option<u64>,
    last_state_logged: Tick,
    interpolated_since_tick: bool,
}

impl<A: NetworkAdapter> SyncManager<A> {
    /// Create a stopped session for `local`, coordinated by `host`
    pub fn new(
        config: SyncConfig,
        local: PeerId,
        host: PeerId,
        adapter: A,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let tick_rate = config.tick_rate();
        let mut manager = Self {
            config,
            local,
            host,
            adapter,
            clock,
            objects: ObjectRegistry::new(),
            peers: LagTracker::new(),
            input_window: TickWindow::new(1),
            state_window: TickWindow::new(0),
            send_queue: SendQueue::new(),
            auditor: StateAuditor::new(),
            interpolator: Interpolator::new(tick_rate),
            events: EventQueue::default(),
            inbound: Vec::new(),
            started: false,
            input_tick: 0,
            current_tick: 0,
            skip_ticks: 0,
            rollback_ticks: 0,
            input_buffer_underruns: 0,
            last_ping_sent: None,
            last_state_logged: -1,
            interpolated_since_tick: false,
        };
        manager.reset();
        Ok(manager)
    }

    // ---- lifecycle ----

    /// Start the session from a clean slate
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.reset();
        self.started = true;
        self.adapter.start();
        log::info!("Sync started for {} ({} peers)", self.local, self.peers.len());
        self.events.push(SyncEvent::SyncStarted);
        self.events.flush();
    }

    /// Stop the session and forget everything learned during it
    ///
    /// Peers stay registered, but their session counters are cleared.
    pub fn stop(&mut self) {
        let was_started = self.started;
        self.adapter.stop();
        self.started = false;
        self.reset();
        self.peers.clear_peers();
        self.objects.sync_stopped();
        if was_started {
            log::info!("Sync stopped for {}", self.local);
            self.events.push(SyncEvent::SyncStopped);
        }
        self.events.flush();
    }

    /// Clear cursors, buffers and queues
    pub fn reset(&mut self) {
        self.input_tick = 0;
        self.current_tick = self.input_tick - self.config.input_delay;
        self.skip_ticks = 0;
        self.rollback_ticks = 0;
        self.input_buffer_underruns = 0;
        self.input_window.reset(1);
        self.state_window.reset(0);
        self.send_queue.reset(1);
        self.interpolator.clear();
        self.auditor.clear();
        self.inbound.clear();
        self.last_state_logged = -1;
        self.interpolated_since_tick = false;
    }

    /// How long the host should wait before starting locally
    ///
    /// Half the highest peer round trip, so the host's first tick lines up
    /// with the moment its start message reaches the slowest peer.
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.peers.highest_rtt() / 2)
    }

    // ---- peers ----

    /// Add a remote peer
    pub fn add_peer(&mut self, id: PeerId) -> Result<()> {
        if id == self.local {
            return Err(Error::SelfPeer(id));
        }
        if !self.peers.add(id) {
            return Err(Error::DuplicatePeer(id));
        }
        log::info!("Peer {} added", id);
        self.events.push(SyncEvent::PeerAdded(id));
        self.events.flush();
        Ok(())
    }

    /// Remove a remote peer; the session stops when none are left
    pub fn remove_peer(&mut self, id: PeerId) {
        if self.peers.remove(id).is_some() {
            self.auditor.remove_peer(id);
            log::info!("Peer {} removed", id);
            self.events.push(SyncEvent::PeerRemoved(id));
        }
        if self.peers.is_empty() {
            self.stop();
        }
        self.events.flush();
    }

    /// Forget every peer without stopping
    pub fn clear_peers(&mut self) {
        self.peers.clear();
        self.auditor.clear();
    }

    pub fn has_peer(&self, id: PeerId) -> bool {
        self.peers.contains(id)
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(id)
    }

    /// Iterate over remote peers in id order
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    // ---- objects ----

    /// Register a simulation object owned by `owner`
    pub fn register_object(
        &mut self,
        path: impl Into<ObjectPath>,
        owner: PeerId,
        capabilities: Capabilities,
        object: Box<dyn SimulationObject>,
    ) -> Result<()> {
        self.objects.register(path.into(), owner, capabilities, object)
    }

    /// Unregister a simulation object
    pub fn unregister_object(&mut self, path: &ObjectPath) -> Option<Box<dyn SimulationObject>> {
        self.objects.unregister(path)
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.objects
    }

    // ---- events ----

    /// Install (or remove) the observer events are delivered to
    pub fn set_observer(&mut self, observer: Option<Box<dyn SyncObserver>>) {
        self.events.set_observer(observer);
        self.events.flush();
    }

    /// Take events queued while no observer was installed
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain()
    }

    // ---- stepping ----

    /// Run one fixed simulation step
    pub fn physics_step(&mut self) -> StepOutcome {
        let outcome = match self.try_physics_step() {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = err.to_string();
                self.handle_fatal_error(err);
                StepOutcome::Halted { reason }
            }
        };
        self.events.flush();
        outcome
    }

    /// Run one render step, `delta_secs` after the previous one
    pub fn render_step(&mut self, delta_secs: f32) {
        let polled = self.adapter.poll();
        self.inbound.extend(polled);

        if self.started && self.config.interpolation && !self.interpolator.is_empty() {
            let weight = self.interpolator.advance(delta_secs);
            self.objects.interpolate(self.interpolator.pairs(), weight);
            self.interpolated_since_tick = true;
        }
        self.events.flush();
    }

    /// Ask for at least `ticks` ticks to be replayed on the next step
    pub fn request_rollback(&mut self, ticks: usize) {
        self.rollback_ticks = self.rollback_ticks.max(ticks);
    }

    fn try_physics_step(&mut self) -> Result<StepOutcome> {
        let mut messages = std::mem::take(&mut self.inbound);
        messages.extend(self.adapter.poll());
        for message in messages {
            self.handle_message(message);
        }
        self.ping_peers_if_due()?;

        if !self.started {
            return Ok(StepOutcome::Idle);
        }

        if self.interpolated_since_tick && !self.config.force_interpolation_rollback {
            if let Some(newest) = self.state_window.back() {
                self.objects.load_state(&newest.data);
            }
        }
        self.interpolated_since_tick = false;

        let debug_ticks = self.config.rollback_debug_ticks;
        if debug_ticks > 0 && self.current_tick > debug_ticks as Tick + 1 {
            self.request_rollback(debug_ticks);
        }
        if self.config.interpolation
            && self.config.force_interpolation_rollback
            && self.current_tick >= 1
        {
            self.request_rollback(1);
        }

        let rolled_back = self.rollback()?;

        if self.is_host() && !self.auditor.is_empty() {
            self.process_state_audit();
        }

        self.peers.record_advantage(
            self.input_tick,
            self.config.ticks_to_recalculate_advantage,
            false,
        );

        let outcome = if let Some(hold) = self.check_sync()? {
            hold
        } else if let Some(hold) = self.check_skip()? {
            hold
        } else {
            self.advance()?;
            StepOutcome::Advanced {
                tick: self.current_tick,
                rolled_back,
            }
        };

        self.forward_confirmed_state()?;
        Ok(outcome)
    }

    /// Resync grace period, lost sync, recovery
    fn check_sync(&mut self) -> Result<Option<StepOutcome>> {
        if self.input_buffer_underruns < 0 {
            self.input_buffer_underruns += 1;
            if self.input_buffer_underruns == 0 {
                log::info!("Sync regained at tick {}", self.current_tick);
                self.events.push(SyncEvent::SyncRegained);
                self.peers.clear_advantage();
                self.skip_ticks = 0;
                return Ok(None);
            }
            self.send_input_to_all_peers()?;
            return Ok(Some(StepOutcome::Resyncing {
                remaining: self.input_buffer_underruns.unsigned_abs() as u32,
            }));
        }

        if !self.cleanup_buffers()? {
            if self.input_buffer_underruns == 0 {
                log::warn!("Sync lost at tick {}", self.current_tick);
                self.events.push(SyncEvent::SyncLost);
            }
            self.input_buffer_underruns += 1;
            let underruns = self.input_buffer_underruns as u32;
            if underruns >= self.config.max_input_buffer_underruns {
                return Err(Error::SyncUnrecoverable { underruns });
            }
            self.send_input_to_all_peers()?;
            return Ok(Some(StepOutcome::SyncLost { underruns }));
        }

        if self.input_buffer_underruns > 0 {
            log::debug!(
                "Input caught up after {} steps, holding {} more",
                self.input_buffer_underruns,
                self.config.skip_ticks_after_sync_regained
            );
            self.input_buffer_underruns = -(self.config.skip_ticks_after_sync_regained as i64);
        }
        Ok(None)
    }

    /// Pending skips, then a fresh skip decision
    fn check_skip(&mut self) -> Result<Option<StepOutcome>> {
        if self.skip_ticks > 0 {
            self.skip_ticks -= 1;
            if self.skip_ticks == 0 {
                self.peers.clear_advantage();
            } else {
                self.send_input_to_all_peers()?;
                return Ok(Some(StepOutcome::Skipping {
                    remaining: self.skip_ticks,
                }));
            }
        }

        let advantage = self.peers.max_advantage();
        if advantage >= 2.0 && self.skip_ticks == 0 {
            self.skip_ticks = (advantage / 2.0) as u32;
            log::debug!(
                "Skipping {} ticks (advantage {:.1})",
                self.skip_ticks,
                advantage
            );
            self.events.push(SyncEvent::SkipTicksFlagged(self.skip_ticks));
            return Ok(Some(StepOutcome::Skipping {
                remaining: self.skip_ticks,
            }));
        }
        Ok(None)
    }

    /// Reload old state and replay up to the current tick
    fn rollback(&mut self) -> Result<usize> {
        let depth = self.rollback_ticks;
        if depth == 0 {
            return Ok(0);
        }
        let available = self.state_window.len();
        if depth + 1 > available {
            return Err(Error::RollbackTooFar {
                requested: depth,
                tick: self.current_tick,
                available,
            });
        }

        let target_tick = self.current_tick;
        if let Some(frame) = self.state_window.from_back(depth) {
            self.objects.load_state(&frame.data);
        }
        self.state_window.truncate_back(depth);
        self.current_tick -= depth as Tick;
        self.events.push(SyncEvent::StateLoaded(depth));

        while self.rollback_ticks > 0 {
            self.current_tick += 1;
            self.do_tick(true)?;
            self.rollback_ticks -= 1;
        }
        debug_assert_eq!(self.current_tick, target_tick);
        Ok(depth)
    }

    /// Generate local input for the next tick and simulate the current one
    fn advance(&mut self) -> Result<()> {
        self.input_tick += 1;
        self.current_tick += 1;

        let tick = self.input_tick;
        let payload = self.objects.collect_local_input(self.local);
        let blob = encode_payload(&payload)?;
        let start = self.input_window.start_tick();
        self.input_window
            .get_or_create(tick, InputFrame::new)
            .map_err(|_| Error::InputFrameUnavailable { tick, start })?
            .set_real(self.local, payload);
        self.send_queue.push(tick, blob)?;
        self.send_input_to_all_peers()?;

        if self.current_tick == 0 {
            self.save_current_state()?;
        } else if self.current_tick > 0 {
            self.do_tick(false)?;

            if self.config.interpolation {
                if let (Some(from), Some(to)) =
                    (self.state_window.from_back(1), self.state_window.from_back(0))
                {
                    self.interpolator.capture(from, to);
                    if self.config.force_interpolation_rollback {
                        self.objects.load_state(&from.data);
                    }
                }
            }
        }
        Ok(())
    }

    /// Predict missing input, simulate `current_tick`, save its state
    fn do_tick(&mut self, is_rollback: bool) -> Result<()> {
        let tick = self.current_tick;
        let start = self.input_window.start_tick();
        if self.input_window.get(tick).is_none() {
            return Err(Error::InputFrameUnavailable { tick, start });
        }

        for peer in self.peers.ids() {
            let predicted = self
                .input_window
                .get(tick)
                .map_or(true, |frame| frame.is_player_input_predicted(peer));
            if !predicted {
                continue;
            }
            let last_received = self
                .peers
                .get(peer)
                .map_or(0, |p| p.last_remote_tick_received);
            let previous = self
                .input_window
                .get(tick - 1)
                .and_then(|frame| frame.player_input(peer));
            let payload = self
                .objects
                .predict_input(peer, previous, tick - last_received);
            if let Some(frame) = self.input_window.get_mut(tick) {
                frame.set_predicted(peer, payload);
            }
        }

        let delta = self.config.tick_rate().delta_secs();
        if let Some(frame) = self.input_window.get(tick) {
            self.objects.network_tick(delta, frame);
        }
        self.save_current_state()?;
        self.events.push(SyncEvent::TickFinished { is_rollback });
        Ok(())
    }

    fn save_current_state(&mut self) -> Result<()> {
        if self.current_tick < 0 {
            return Ok(());
        }
        let data = self.objects.save_state();
        self.state_window
            .push(StateFrame::new(self.current_tick, data))?;
        Ok(())
    }

    /// Retire what no rollback can need any more
    ///
    /// Returns false when the oldest state cannot be retired because the
    /// following tick still lacks real input from some peer.
    fn cleanup_buffers(&mut self) -> Result<bool> {
        let wanted = self
            .peers
            .min_next_tick_requested()
            .unwrap_or(self.send_queue.next_tick());
        self.send_queue.trim_to(wanted);

        let peers = self.peers.ids();
        while self.state_window.len() > self.config.max_buffer_size {
            let Some(oldest) = self.state_window.front().map(|f| f.tick) else {
                break;
            };
            let next = oldest + 1;
            match self.input_window.get(next) {
                Some(frame) if frame.is_complete(peers.iter().copied()) => {}
                Some(frame) => {
                    log::debug!(
                        "Can't retire state {}: input {} still missing from {:?}",
                        oldest,
                        next,
                        frame.missing_peers(peers.iter().copied())
                    );
                    return Ok(false);
                }
                None => {
                    log::debug!("Can't retire state {}: no input frame {}", oldest, next);
                    return Ok(false);
                }
            }
            self.state_window.pop_front();
        }

        let max = self.config.max_buffer_size as Tick;
        while self.current_tick - self.input_window.start_tick() > max {
            if self.input_window.pop_front().is_none() {
                break;
            }
        }
        Ok(true)
    }

    fn handle_fatal_error(&mut self, err: Error) {
        log::error!("Network sync lost: {}", err);
        self.events.push(SyncEvent::SyncError(err.to_string()));
        self.stop();
    }

    // ---- inbound ----

    fn handle_message(&mut self, message: InboundMessage) {
        let from = message.from();
        let result = match message {
            InboundMessage::Input { from, bytes } => self.receive_input(from, &bytes),
            InboundMessage::Ping { from, bytes } => self.receive_ping(from, &bytes),
            InboundMessage::PingBack { from, bytes } => self.receive_ping_back(from, &bytes),
            InboundMessage::State { from, bytes } => self.receive_state(from, &bytes),
        };
        if let Err(err) = result {
            log::debug!("Discarding message from {}: {}", from, err);
        }
    }

    /// Apply an input message from `from`
    ///
    /// Ignored while stopped. Ticks already known or retired are skipped;
    /// a message starting a full buffer ahead of us is dropped whole.
    pub fn receive_input(&mut self, from: PeerId, bytes: &[u8]) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        if !self.peers.contains(from) {
            return Err(Error::UnknownPeer(from));
        }
        let message = InputMessage::from_bytes(bytes)?;
        let Some(first_tick) = message.first_tick() else {
            return Ok(());
        };
        let horizon = self.input_tick + self.config.max_buffer_size as Tick;
        if first_tick >= horizon {
            log::debug!(
                "Discarding input from {} starting at future tick {}",
                from,
                first_tick
            );
            return Ok(());
        }

        let last_received = self
            .peers
            .get(from)
            .map_or(0, |p| p.last_remote_tick_received);

        for (remote_tick, mut remote) in message.decode()? {
            if remote_tick <= last_received || remote_tick < self.input_window.start_tick() {
                continue;
            }
            if remote_tick >= horizon {
                log::debug!("Dropping input from {} for future tick {}", from, remote_tick);
                continue;
            }
            remote.seal();

            let start = self.input_window.start_tick();
            let frame = self
                .input_window
                .get_or_create(remote_tick, InputFrame::new)
                .map_err(|_| Error::InputFrameUnavailable {
                    tick: remote_tick,
                    start,
                })?;
            if !frame.is_player_input_predicted(from) {
                continue;
            }

            let tick_delta = self.current_tick - remote_tick;
            if tick_delta >= 0 && self.rollback_ticks as Tick <= tick_delta {
                let local = frame.player_input(from).cloned();
                let remote_hash = remote.hash();
                frame.set_real(from, remote.clone());
                if local.as_ref().map(InputPayload::hash) != Some(remote_hash) {
                    self.rollback_ticks = (tick_delta + 1) as usize;
                    log::debug!(
                        "Rollback of {} ticks flagged by {} at tick {}",
                        self.rollback_ticks,
                        from,
                        remote_tick
                    );
                    self.events.push(SyncEvent::RollbackFlagged {
                        tick: remote_tick,
                        peer: from,
                        local: local.unwrap_or_default(),
                        remote,
                    });
                }
            } else {
                frame.set_real(from, remote);
            }
        }

        if let Some(peer) = self.peers.get_mut(from) {
            let mut next = peer.last_remote_tick_received + 1;
            while self
                .input_window
                .get(next)
                .is_some_and(|frame| !frame.is_player_input_predicted(from))
            {
                peer.last_remote_tick_received = next;
                next += 1;
            }
            peer.next_local_tick_requested = peer
                .next_local_tick_requested
                .max(message.next_tick_requested);
            peer.remote_lag = (peer.last_remote_tick_received + 1) - peer.next_local_tick_requested;
        }
        Ok(())
    }

    /// Answer a ping
    pub fn receive_ping(&mut self, from: PeerId, bytes: &[u8]) -> Result<()> {
        if from == self.local {
            return Ok(());
        }
        let ping = PingMessage::from_bytes(bytes)?;
        let reply = ping.answer(self.clock.now_millis()).to_bytes()?;
        if let Err(err) = self.adapter.send_ping_back(from, &reply) {
            log::warn!("Failed to answer ping from {}: {}", from, err);
        }
        Ok(())
    }

    /// Update round trip and clock estimates from a ping-back
    pub fn receive_ping_back(&mut self, from: PeerId, bytes: &[u8]) -> Result<()> {
        let ping = PingMessage::from_bytes(bytes)?;
        let remote_time = ping
            .remote_time
            .ok_or_else(|| Error::Malformed("ping-back without remote_time".into()))?;
        let now = self.clock.now_millis();
        let peer = self.peers.get_mut(from).ok_or(Error::UnknownPeer(from))?;
        peer.record_ping_back(ping.local_time, remote_time, now);
        self.events.push(SyncEvent::PeerPingUpdated {
            peer: from,
            rtt: peer.rtt,
            clock_delta: peer.clock_delta,
        });
        Ok(())
    }

    /// Queue a peer's saved state for auditing (host only)
    pub fn receive_state(&mut self, from: PeerId, bytes: &[u8]) -> Result<()> {
        if !self.started || !self.is_host() {
            return Ok(());
        }
        if !self.peers.contains(from) {
            return Err(Error::UnknownPeer(from));
        }
        let message = StateMessage::from_bytes(bytes)?;
        self.auditor
            .log(from, StateFrame::new(message.tick, message.state));
        Ok(())
    }

    // ---- outbound ----

    fn ping_peers_if_due(&mut self) -> Result<()> {
        let now = self.clock.now_millis();
        let due = self
            .last_ping_sent
            .map_or(true, |sent| now.saturating_sub(sent) >= self.config.ping_interval_ms);
        if !due || self.peers.is_empty() {
            return Ok(());
        }
        self.last_ping_sent = Some(now);

        let bytes = PingMessage::ping(now).to_bytes()?;
        for id in self.peers.ids() {
            if let Err(err) = self.adapter.send_ping(id, &bytes) {
                log::warn!("Failed to ping {}: {}", id, err);
            }
        }
        Ok(())
    }

    fn send_input_to_all_peers(&mut self) -> Result<()> {
        let max_frames = self.config.max_input_frames_per_message;
        let max_messages = self.config.max_messages_at_once;

        for peer in self.peers.iter() {
            let batches =
                self.send_queue
                    .batches_for(peer.next_local_tick_requested, max_frames, max_messages);
            for batch in batches {
                let bytes =
                    InputMessage::new(peer.last_remote_tick_received + 1, batch).to_bytes()?;
                if bytes.len() > self.config.debug_message_bytes {
                    log::trace!("Sending {} byte input message to {}", bytes.len(), peer.id);
                }
                if let Err(err) = self.adapter.send_input(peer.id, &bytes) {
                    log::warn!("Failed to send input to {}: {}", peer.id, err);
                }
            }
        }
        Ok(())
    }

    /// Forward newly confirmed state to the host
    ///
    /// A tick is confirmed once every peer's input up to it is real; its
    /// saved state can no longer change.
    fn forward_confirmed_state(&mut self) -> Result<()> {
        if !self.started
            || !self.config.log_state
            || self.is_host()
            || !self.peers.contains(self.host)
        {
            return Ok(());
        }
        let confirmed = self.confirmed_tick().min(self.current_tick);
        let first = (self.last_state_logged + 1).max(self.state_window.start_tick());
        for tick in first..=confirmed {
            let Some(frame) = self.state_window.get(tick) else {
                continue;
            };
            let bytes = StateMessage {
                tick,
                state: frame.data.clone(),
            }
            .to_bytes()?;
            if let Err(err) = self.adapter.send_state(self.host, &bytes) {
                log::warn!("Failed to forward state {} to host: {}", tick, err);
            }
        }
        self.last_state_logged = self.last_state_logged.max(confirmed);
        Ok(())
    }

    fn process_state_audit(&mut self) {
        let confirmed = self.confirmed_tick();
        for mismatch in self
            .auditor
            .process(&self.state_window, |tick| tick <= confirmed)
        {
            log::warn!(
                "State of {} differs from ours at tick {}",
                mismatch.peer,
                mismatch.tick
            );
            for (path, local) in &mismatch.local {
                let remote = mismatch.remote.get(path);
                if remote == Some(local) {
                    continue;
                }
                log::debug!(
                    "  {}: local {:016x}, remote {}",
                    path,
                    hash_state(local, DEFAULT_HASH_SEED),
                    remote.map_or_else(
                        || "missing".to_string(),
                        |r| format!("{:016x}", hash_state(r, DEFAULT_HASH_SEED))
                    )
                );
            }
            self.events.push(SyncEvent::RemoteStateMismatch {
                tick: mismatch.tick,
                peer: mismatch.peer,
                local: mismatch.local,
                remote: mismatch.remote,
            });
        }
    }

    /// Newest tick for which every peer's input is real
    fn confirmed_tick(&self) -> Tick {
        self.peers
            .iter()
            .map(|p| p.last_remote_tick_received)
            .min()
            .unwrap_or(self.input_tick)
            .min(self.input_tick)
    }

    // ---- queries ----

    /// Check if every peer's real input for `tick` is known
    ///
    /// Ticks past the newest input frame are incomplete; ticks already
    /// retired from the window are complete.
    pub fn is_player_input_complete(&self, tick: Tick) -> bool {
        match self.input_window.last_tick() {
            Some(last) if tick <= last => {}
            _ => return false,
        }
        match self.input_window.get(tick) {
            Some(frame) => frame.is_complete(self.peers.ids()),
            None => true,
        }
    }

    pub fn is_current_player_input_complete(&self) -> bool {
        self.is_player_input_complete(self.current_tick)
    }

    /// Newest real input received from a peer
    pub fn latest_input_from_peer(&self, peer: PeerId) -> Option<&InputPayload> {
        let tick = self.peers.get(peer)?.last_remote_tick_received;
        self.input_window.get(tick)?.player_input(peer)
    }

    /// Newest real input for an object, from whichever peer owns it
    pub fn latest_input_for_object(&self, path: &ObjectPath) -> Option<&InputMap> {
        let owner = self.objects.owner(path)?;
        let payload = if owner == self.local {
            self.input_window.get(self.input_tick)?.player_input(owner)?
        } else {
            self.latest_input_from_peer(owner)?
        };
        payload.get(path)
    }

    pub fn input_frame(&self, tick: Tick) -> Option<&InputFrame> {
        self.input_window.get(tick)
    }

    pub fn state_frame(&self, tick: Tick) -> Option<&StateFrame> {
        self.state_window.get(tick)
    }

    pub fn input_stats(&self) -> BufferStats {
        self.input_window.stats()
    }

    pub fn state_stats(&self) -> BufferStats {
        self.state_window.stats()
    }

    /// Number of ticks waiting in the send queue
    pub fn send_queue_len(&self) -> usize {
        self.send_queue.len()
    }

    // ---- accessors ----

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    pub fn is_host(&self) -> bool {
        self.local == self.host
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn input_tick(&self) -> Tick {
        self.input_tick
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn skip_ticks(&self) -> u32 {
        self.skip_ticks
    }

    pub fn rollback_ticks(&self) -> usize {
        self.rollback_ticks
    }

    /// Positive while sync is lost, negative during the resync grace period
    pub fn input_buffer_underruns(&self) -> i64 {
        self.input_buffer_underruns
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }
}
