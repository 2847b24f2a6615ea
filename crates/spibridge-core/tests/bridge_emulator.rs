#![cfg(unix)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use spibridge_core::{
    BridgeConfig, BridgeError, Diagnostic, EmulatorListener, ErrorKind, ProtocolError,
    RecordingSink, RegisterEmulator, SpiBridge, StatusCheck, TransactionState,
    STATUS_BURST_REJECTED,
};
use spibridge_frame::{AddressingMode, ChunkPlan};
use spibridge_transport::BridgeStream;

fn unique_sock_path(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/spib-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir.join("bridge.sock")
}

/// Client bridge wired to an emulator thread over a socket pair.
fn paired(
    emulator: RegisterEmulator,
    config: BridgeConfig,
) -> (
    SpiBridge<BridgeStream>,
    RecordingSink,
    thread::JoinHandle<spibridge_core::Result<usize>>,
) {
    let (client, mut server) = BridgeStream::pair().expect("socket pair should open");
    let handle = thread::spawn(move || emulator.serve(&mut server));
    let sink = RecordingSink::new();
    let bridge = SpiBridge::new(client, config)
        .expect("config should be valid")
        .with_sink(Arc::new(sink.clone()));
    (bridge, sink, handle)
}

fn chunk_sizes(sink: &RecordingSink) -> Vec<usize> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            Diagnostic::ChunkExchanged { size, .. } => Some(size),
            _ => None,
        })
        .collect()
}

#[test]
fn register_write_read_roundtrip_both_modes() {
    for mode in [AddressingMode::Direct, AddressingMode::Multiplexed] {
        let (mut bridge, _sink, server) = paired(
            RegisterEmulator::new(mode, 1024).expect("emulator chunk size"),
            BridgeConfig::default(),
        );

        for address in [0x00u8, 0x05, 0x40, 0x7F] {
            for mux_target in [0u8, 1] {
                let value = address ^ 0x5A ^ mux_target;
                bridge
                    .write(mode, mux_target, address, value)
                    .expect("write should succeed");
                assert_eq!(
                    bridge
                        .read(mode, mux_target, address)
                        .expect("read should succeed"),
                    value
                );
            }
        }

        drop(bridge);
        let served = server.join().expect("server thread").expect("serve");
        assert_eq!(served, 16);
    }
}

#[test]
fn high_bit_address_uses_masked_register() {
    let (mut bridge, sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Direct, 1024).expect("emulator chunk size"),
        BridgeConfig::default(),
    );

    bridge
        .write(AddressingMode::Direct, 0, 0x85, 0x42)
        .expect("write should succeed");
    assert_eq!(
        bridge
            .read(AddressingMode::Direct, 0, 0x05)
            .expect("read should succeed"),
        0x42
    );
    assert!(sink.events().contains(&Diagnostic::AddressMasked {
        requested: 0x85,
        used: 0x05
    }));

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn burst_roundtrip_around_chunk_limit() {
    let chunk_size = 64;
    for mode in [AddressingMode::Direct, AddressingMode::Multiplexed] {
        let h = mode.header_len();
        let (mut bridge, _sink, server) = paired(
            RegisterEmulator::new(mode, chunk_size).expect("emulator chunk size"),
            BridgeConfig::default().with_chunk_size(chunk_size),
        );

        for len in [1, chunk_size - h - 1, chunk_size - h, chunk_size, 3 * chunk_size - h, 1000] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            bridge
                .burst_write(mode, 2, 0x20, &payload)
                .expect("burst write should succeed");
            let back = bridge
                .burst_read(mode, 2, 0x20, len)
                .expect("burst read should succeed");
            assert_eq!(back, payload, "mode {mode:?} len {len}");
        }

        drop(bridge);
        server.join().expect("server thread").expect("serve");
    }
}

#[test]
fn burst_of_2500_bytes_uses_three_chunks() {
    let (mut bridge, sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Direct, 1024).expect("emulator chunk size"),
        BridgeConfig::default(),
    );
    let payload = vec![0x3C; 2500];

    bridge
        .burst_write(AddressingMode::Direct, 0, 0x20, &payload)
        .expect("burst write should succeed");
    assert_eq!(chunk_sizes(&sink), vec![1024, 1024, 456]);

    let h = AddressingMode::Direct.header_len();
    let plan = ChunkPlan::new(payload.len() + h, h, 1024).expect("plan");
    assert_eq!(plan.chunk_count(), (2500 + h).div_ceil(1024));

    sink.take();
    let back = bridge
        .burst_read(AddressingMode::Direct, 0, 0x20, 2500)
        .expect("burst read should succeed");
    assert_eq!(back, payload);
    assert_eq!(chunk_sizes(&sink), vec![1024, 1024, 452]);

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn exact_multiple_of_chunk_size_stops_cleanly() {
    let (mut bridge, sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Direct, 1024).expect("emulator chunk size"),
        BridgeConfig::default(),
    );

    bridge
        .burst_write(AddressingMode::Direct, 0, 0x01, &vec![0x11; 2048 - 4])
        .expect("burst write should succeed");
    assert_eq!(chunk_sizes(&sink), vec![1024, 1024]);

    sink.take();
    bridge
        .burst_read(AddressingMode::Direct, 0, 0x01, 2048)
        .expect("burst read should succeed");
    assert_eq!(chunk_sizes(&sink), vec![1024, 1024]);

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn every_chunk_status_check_passes_against_emulator() {
    let (mut bridge, _sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Multiplexed, 32).expect("emulator chunk size"),
        BridgeConfig::default()
            .with_chunk_size(32)
            .with_status_check(StatusCheck::EveryChunk),
    );
    let payload: Vec<u8> = (0..200u8).collect();

    bridge
        .burst_write(AddressingMode::Multiplexed, 1, 0x10, &payload)
        .expect("burst write should succeed");
    assert_eq!(
        bridge
            .burst_read(AddressingMode::Multiplexed, 1, 0x10, payload.len())
            .expect("burst read should succeed"),
        payload
    );

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn rejecting_remote_surfaces_nack() {
    let (mut bridge, sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Direct, 1024).expect("emulator chunk size").with_status(0x2A),
        BridgeConfig::default(),
    );

    let err = bridge
        .write(AddressingMode::Direct, 0, 0x01, 0x01)
        .expect_err("write should be rejected");
    assert!(matches!(
        err,
        BridgeError::Protocol(ProtocolError::RemoteNack { code: 0x2A })
    ));

    let err = bridge
        .burst_write(AddressingMode::Direct, 0, 0x01, &[0u8; 3000])
        .expect_err("burst write should be rejected");
    assert_eq!(err.kind(), ErrorKind::Protocol);

    let mut out = [0x77u8; 16];
    let err = bridge
        .burst_read_into(AddressingMode::Direct, 0, 0x01, &mut out)
        .expect_err("burst read should be rejected");
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(out, [0x77; 16]);
    assert_eq!(sink.states().last(), Some(&TransactionState::Failed));

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn remote_verdict_on_final_chunk_reaches_caller() {
    let (mut bridge, sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Direct, 64)
            .expect("emulator chunk size")
            .with_burst_limit(100),
        BridgeConfig::default().with_chunk_size(64),
    );

    let err = bridge
        .burst_write(AddressingMode::Direct, 0, 0x30, &[0x44; 200])
        .expect_err("over-limit burst should be rejected");
    assert!(matches!(
        err,
        BridgeError::Protocol(ProtocolError::RemoteNack {
            code: STATUS_BURST_REJECTED
        })
    ));
    assert_eq!(chunk_sizes(&sink), vec![64, 64, 64]);
    assert_eq!(sink.states().last(), Some(&TransactionState::Failed));

    bridge
        .burst_write(AddressingMode::Direct, 0, 0x30, &[0x45; 100])
        .expect("burst within limit should succeed");
    assert_eq!(
        bridge
            .burst_read(AddressingMode::Direct, 0, 0x30, 100)
            .expect("burst read should succeed"),
        vec![0x45; 100]
    );

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn zero_length_burst_is_rejected_without_io() {
    let (mut bridge, sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Direct, 1024).expect("emulator chunk size"),
        BridgeConfig::default(),
    );

    let err = bridge
        .burst_write(AddressingMode::Direct, 0, 0x01, &[])
        .expect_err("empty burst should fail");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = bridge
        .burst_read(AddressingMode::Direct, 0, 0x01, 0)
        .expect_err("empty burst should fail");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(sink.events().is_empty());

    drop(bridge);
    let served = server.join().expect("server thread").expect("serve");
    assert_eq!(served, 0);
}

#[test]
fn threads_share_one_bridge_through_a_lock() {
    let (bridge, _sink, server) = paired(
        RegisterEmulator::new(AddressingMode::Multiplexed, 128).expect("emulator chunk size"),
        BridgeConfig::default().with_chunk_size(128),
    );
    let bridge = Arc::new(Mutex::new(bridge));

    let workers: Vec<_> = (0..4u8)
        .map(|target| {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let payload = vec![target; 500];
                for address in 0..8u8 {
                    let mut bridge = bridge.lock().expect("lock");
                    bridge
                        .write(AddressingMode::Multiplexed, target, address, target)
                        .expect("write should succeed");
                    bridge
                        .burst_write(AddressingMode::Multiplexed, target, 0x40 + address, &payload)
                        .expect("burst should succeed");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }

    let mut bridge = Arc::try_unwrap(bridge)
        .ok()
        .expect("workers done")
        .into_inner()
        .expect("lock");
    for target in 0..4u8 {
        assert_eq!(
            bridge
                .read(AddressingMode::Multiplexed, target, 3)
                .expect("read should succeed"),
            target
        );
        assert_eq!(
            bridge
                .burst_read(AddressingMode::Multiplexed, target, 0x43, 500)
                .expect("burst read should succeed"),
            vec![target; 500]
        );
    }

    drop(bridge);
    server.join().expect("server thread").expect("serve");
}

#[test]
fn connect_over_unix_socket_endpoint() {
    let sock_path = unique_sock_path("connect");
    let listener = EmulatorListener::bind(
        &sock_path,
        RegisterEmulator::new(AddressingMode::Direct, 1024).expect("emulator chunk size"),
    )
    .expect("emulator should bind");
    let bank = listener.emulator().bank();

    let server = thread::spawn(move || listener.serve_one());

    let config = BridgeConfig::default()
        .with_socket_path(&sock_path)
        .with_timeout(Some(std::time::Duration::from_secs(5)));
    let mut bridge = SpiBridge::connect(config).expect("bridge should connect");
    bridge
        .write(AddressingMode::Direct, 0, 0x22, 0x99)
        .expect("write should succeed");
    drop(bridge);

    assert_eq!(server.join().expect("server thread").expect("serve"), 1);
    assert_eq!(
        bank.lock()
            .expect("lock")
            .read_byte(None, spibridge_frame::RegisterAddress::new(0x22)),
        0x99
    );

    if let Some(parent) = sock_path.parent() {
        let _ = std::fs::remove_dir_all(parent);
    }
}

#[test]
fn connect_failure_yields_no_bridge() {
    let sock_path = unique_sock_path("absent");
    let err = SpiBridge::connect(BridgeConfig::default().with_socket_path(&sock_path))
        .err()
        .expect("connect should fail");
    assert!(matches!(
        err,
        BridgeError::Transport(spibridge_transport::TransportError::Connect { .. })
    ));

    if let Some(parent) = sock_path.parent() {
        let _ = std::fs::remove_dir_all(parent);
    }
}

#[test]
fn listener_serves_clients_on_their_own_threads() {
    let sock_path = unique_sock_path("spawn");
    let listener = EmulatorListener::bind(
        &sock_path,
        RegisterEmulator::new(AddressingMode::Multiplexed, 1024).expect("emulator chunk size"),
    )
    .expect("emulator should bind");

    let server = thread::spawn(move || {
        let sessions: Vec<_> = (0..2)
            .map(|_| listener.spawn_one().expect("accept should succeed"))
            .collect();
        sessions
            .into_iter()
            .map(|session| session.join().expect("session thread").expect("serve"))
            .sum::<usize>()
    });

    let config = BridgeConfig::default().with_socket_path(&sock_path);
    let mut first = SpiBridge::connect(config.clone()).expect("first client should connect");
    let mut second = SpiBridge::connect(config).expect("second client should connect");

    second
        .write(AddressingMode::Multiplexed, 1, 0x10, 0xB2)
        .expect("second client write");
    first
        .write(AddressingMode::Multiplexed, 0, 0x10, 0xA1)
        .expect("first client write");
    assert_eq!(
        second
            .read(AddressingMode::Multiplexed, 0, 0x10)
            .expect("shared bank read"),
        0xA1
    );
    drop(first);
    drop(second);

    assert_eq!(server.join().expect("server thread"), 3);

    if let Some(parent) = sock_path.parent() {
        let _ = std::fs::remove_dir_all(parent);
    }
}
