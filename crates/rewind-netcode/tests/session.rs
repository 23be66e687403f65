//! Session lifecycle, pacing and auditing over a loopback network

mod common;

use common::*;
use rewind_core::{ManualClock, ObjectPath};
use rewind_netcode::{
    Capabilities, Error, NetworkTimer, StepOutcome, SyncConfig, SyncEvent, SyncManager,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_solo_session_keeps_buffers_bounded() {
    init_logger();
    let net = LoopbackNet::new(0);
    let config = SyncConfig::default();
    let mut sync = SyncManager::new(
        config.clone(),
        HOST,
        HOST,
        net.adapter(HOST),
        Box::new(ManualClock::new(0)),
    )
    .unwrap();
    sync.register_object(host_player(), HOST, Capabilities::all(), Box::new(Player::new(steady)))
        .unwrap();
    sync.start();

    for _ in 0..40 {
        assert!(matches!(sync.physics_step(), StepOutcome::Advanced { .. }));
    }
    assert_eq!(sync.current_tick(), 38);
    assert_eq!(sync.input_tick(), 40);

    // cleanup trims up to current_tick - max_buffer_size before the frame
    // for the next input tick is created
    let input = sync.input_stats();
    assert_eq!(input.count, config.max_buffer_size + config.input_delay as usize + 2);
    assert_eq!(input.oldest_tick, 7);
    assert_eq!(input.newest_tick, 40);

    let state = sync.state_stats();
    assert_eq!(state.count, config.max_buffer_size + 1);
    assert_eq!(state.newest_tick, 38);

    // nobody to send to, nothing to keep
    assert!(sync.send_queue_len() <= 1);
}

#[test]
fn test_ping_measures_round_trip_and_clock_offset() {
    init_logger();
    let net = LoopbackNet::new(2);
    let host_clock = ManualClock::new(5_000);
    let client_clock = ManualClock::new(9_000);
    let mut host = session_with_clock(
        &net,
        SyncConfig::default(),
        HOST,
        host_clock.clone(),
        Player::new(steady),
        Player::new(steady),
    );
    let mut client = session_with_clock(
        &net,
        SyncConfig::default(),
        CLIENT,
        client_clock.clone(),
        Player::new(steady),
        Player::new(steady),
    );

    // pings flow before the session starts
    for _ in 0..5 {
        step_all(&net, &mut [&mut host, &mut client]);
        host_clock.advance(16);
        client_clock.advance(16);
    }

    let seen_by_host = host.peer(CLIENT).unwrap();
    assert_eq!(seen_by_host.rtt, 64);
    assert_eq!(seen_by_host.clock_delta, 4_000);
    let seen_by_client = client.peer(HOST).unwrap();
    assert_eq!(seen_by_client.rtt, 64);
    assert_eq!(seen_by_client.clock_delta, -4_000);

    assert_eq!(host.start_delay().as_millis(), 32);
    assert!(host.drain_events().contains(&SyncEvent::PeerPingUpdated {
        peer: CLIENT,
        rtt: 64,
        clock_delta: 4_000,
    }));
}

#[test]
fn test_peer_ahead_of_the_other_skips_ticks() {
    init_logger();
    let net = LoopbackNet::new(0);
    let mut host = session(
        &net,
        SyncConfig::default(),
        HOST,
        Player::new(steady),
        Player::new(steady),
    );
    let mut client = session(
        &net,
        SyncConfig::default(),
        CLIENT,
        Player::new(steady),
        Player::new(steady),
    );

    host.start();
    for _ in 0..6 {
        step_all(&net, &mut [&mut host, &mut client]);
    }
    client.start();

    let mut held = 0;
    for _ in 0..74 {
        if matches!(host.physics_step(), StepOutcome::Skipping { .. }) {
            held += 1;
        }
        assert!(matches!(
            client.physics_step(),
            StepOutcome::Advanced { .. }
        ));
        net.step();
    }

    let flagged: Vec<u32> = host
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::SkipTicksFlagged(n) => Some(n),
            _ => None,
        })
        .collect();
    assert_eq!(flagged.len(), 1);
    let skipped = flagged[0];
    assert!(skipped >= 2);
    assert_eq!(held, skipped);
    assert_eq!(host.input_tick() - client.input_tick(), 6 - skipped as i64);

    assert!(!client
        .drain_events()
        .iter()
        .any(|e| matches!(e, SyncEvent::SkipTicksFlagged(_))));
}

#[test]
fn test_host_reports_desynced_client_state() {
    init_logger();
    let net = LoopbackNet::new(1);
    let mut host = session(
        &net,
        SyncConfig::default(),
        HOST,
        Player::new(steady),
        Player::new(zigzag),
    );
    let mut client = session(
        &net,
        SyncConfig::default(),
        CLIENT,
        Player::new(steady),
        Player::desynced(zigzag),
    );
    host.start();
    client.start();
    for _ in 0..20 {
        step_all(&net, &mut [&mut host, &mut client]);
    }

    let mismatches: Vec<_> = host
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::RemoteStateMismatch {
                tick,
                peer,
                local,
                remote,
            } => Some((tick, peer, local, remote)),
            _ => None,
        })
        .collect();
    assert!(!mismatches.is_empty());
    // tick 0 is saved before anything is simulated
    assert_eq!(mismatches[0].0, 1);
    for (_, peer, local, remote) in &mismatches {
        assert_eq!(*peer, CLIENT);
        assert_eq!(local.get(&host_player()), remote.get(&host_player()));
        assert_ne!(local.get(&client_player()), remote.get(&client_player()));
    }

    // only the host audits
    assert!(!client
        .drain_events()
        .iter()
        .any(|e| matches!(e, SyncEvent::RemoteStateMismatch { .. })));
}

#[test]
fn test_host_accepts_matching_client_state() {
    init_logger();
    let net = LoopbackNet::new(1);
    let mut host = session(
        &net,
        SyncConfig::default(),
        HOST,
        Player::new(steady),
        Player::new(zigzag),
    );
    let mut client = session(
        &net,
        SyncConfig::default(),
        CLIENT,
        Player::new(steady),
        Player::new(zigzag),
    );
    host.start();
    client.start();
    for _ in 0..20 {
        step_all(&net, &mut [&mut host, &mut client]);
    }
    assert!(!host
        .drain_events()
        .iter()
        .any(|e| matches!(e, SyncEvent::RemoteStateMismatch { .. })));
}

#[test]
fn test_timer_counts_the_same_on_every_peer() {
    init_logger();
    let net = LoopbackNet::new(2);
    let fired = Rc::new(RefCell::new(Vec::new()));
    let mut sessions = Vec::new();
    for local in [HOST, CLIENT] {
        let mut sync = session(
            &net,
            SyncConfig::default(),
            local,
            Player::new(zigzag),
            Player::new(turns_at_ten),
        );
        let sink = fired.clone();
        let timer = NetworkTimer::new(5)
            .autostart()
            .on_timeout(move |count| sink.borrow_mut().push((local, count)));
        sync.register_object("timer", HOST, Capabilities::STATEFUL, Box::new(timer))
            .unwrap();
        sync.start();
        sessions.push(sync);
    }

    for _ in 0..30 {
        for sync in sessions.iter_mut() {
            sync.physics_step();
        }
        net.step();
    }

    let timer = ObjectPath::new("timer");
    for sync in &sessions {
        let tick = sync.current_tick();
        assert_eq!(tick, 28);
        let state = sync.state_frame(tick).unwrap().get(&timer).unwrap();
        assert_eq!(state.get("timeouts").and_then(|v| v.as_int()), Some(tick / 5));

        // replays report counts already seen, never new ones
        let local = sync.local_peer();
        let counts: Vec<u64> = fired
            .borrow()
            .iter()
            .filter(|(peer, _)| *peer == local)
            .map(|(_, count)| *count)
            .collect();
        assert_eq!(counts.iter().max().copied(), Some((tick / 5) as u64));
        assert!(counts.windows(2).all(|w| w[1] <= w[0] + 1));
    }
}

#[test]
fn test_observer_sees_lifecycle() {
    init_logger();
    let net = LoopbackNet::new(0);
    let mut sync = session(
        &net,
        SyncConfig::default(),
        HOST,
        Player::new(steady),
        Player::new(steady),
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    sync.set_observer(Some(Box::new(move |event: &SyncEvent| {
        sink.borrow_mut().push(event.clone())
    })));

    sync.start();
    sync.remove_peer(CLIENT);
    assert!(!sync.is_started());
    assert_eq!(sync.physics_step(), StepOutcome::Idle);

    assert_eq!(
        *seen.borrow(),
        vec![
            SyncEvent::PeerAdded(CLIENT),
            SyncEvent::SyncStarted,
            SyncEvent::PeerRemoved(CLIENT),
            SyncEvent::SyncStopped,
        ]
    );
    assert!(sync.drain_events().is_empty());
}

#[test]
fn test_config_loaded_from_file() {
    init_logger();
    let path = std::env::temp_dir().join(format!("rewind-netcode-{}.ron", std::process::id()));
    std::fs::write(
        &path,
        "(\n    input_delay: 3,\n    max_buffer_size: 12,\n    interpolation: false,\n)\n",
    )
    .unwrap();
    let config = SyncConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.input_delay, 3);
    assert_eq!(config.max_buffer_size, 12);
    assert!(!config.interpolation);
    assert_eq!(config.ticks_per_second, 60);

    let net = LoopbackNet::new(0);
    let sync = session(&net, config, HOST, Player::new(steady), Player::new(steady));
    assert_eq!(sync.current_tick(), -3);

    let broken = SyncConfig {
        max_buffer_size: 1,
        ..SyncConfig::default()
    };
    let result = SyncManager::new(
        broken,
        HOST,
        HOST,
        net.adapter(HOST),
        Box::new(ManualClock::new(0)),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
