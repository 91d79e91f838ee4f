mod common;

use std::{
    io::{Read, Write},
    net::TcpStream,
    thread,
    time::Duration,
};

use beast_net::{Config, Direction, Engine, ReadMode};
use common::{pump, HEARTBEAT};

fn localhost() -> std::net::SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn relays_a_single_frame_from_input_to_output() {
    let mut engine = Engine::new(Config::default()).expect("engine");
    let in_svc = engine.add_service(&[localhost()], Direction::Input, ReadMode::BeastData).expect("listen input");
    let out_svc = engine.add_service(&[localhost()], Direction::Output, ReadMode::Ignore).expect("listen output");
    let in_addr = engine.service_local_addr(in_svc, 0).unwrap();
    let out_addr = engine.service_local_addr(out_svc, 0).unwrap();

    let reader = thread::spawn(move || {
        let mut sink = TcpStream::connect(out_addr).expect("connect sink");
        sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 64];
        let mut total = Vec::new();
        while total.len() < HEARTBEAT.len() {
            let n = sink.read(&mut buf).expect("read sink");
            if n == 0 {
                break;
            }
            total.extend_from_slice(&buf[..n]);
        }
        total
    });

    pump(&mut engine, Duration::from_millis(100));

    let mut source = TcpStream::connect(in_addr).expect("connect source");
    source.write_all(&HEARTBEAT).expect("write frame");

    pump(&mut engine, Duration::from_millis(500));

    assert_eq!(reader.join().expect("reader thread"), HEARTBEAT);
}

#[test]
fn preserves_a_stuffed_escape_byte_inside_a_frame() {
    // Type '1' frame whose signal-level byte is a literal 0x1A.
    let frame: [u8; 11] = [0x1A, b'1', 0, 0, 0, 0, 0, 0x1A, 0x1A, 0, 0];

    let mut engine = Engine::new(Config::default()).expect("engine");
    let in_svc = engine.add_service(&[localhost()], Direction::Input, ReadMode::BeastData).expect("listen input");
    let out_svc = engine.add_service(&[localhost()], Direction::Output, ReadMode::Ignore).expect("listen output");
    let in_addr = engine.service_local_addr(in_svc, 0).unwrap();
    let out_addr = engine.service_local_addr(out_svc, 0).unwrap();

    let reader = thread::spawn(move || {
        let mut sink = TcpStream::connect(out_addr).expect("connect sink");
        sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 64];
        let mut total = Vec::new();
        while total.len() < 11 {
            let n = sink.read(&mut buf).expect("read sink");
            if n == 0 {
                break;
            }
            total.extend_from_slice(&buf[..n]);
        }
        total
    });

    pump(&mut engine, Duration::from_millis(100));

    let mut source = TcpStream::connect(in_addr).expect("connect source");
    source.write_all(&frame).expect("write frame");

    pump(&mut engine, Duration::from_millis(500));

    assert_eq!(reader.join().expect("reader thread"), frame);
}

#[test]
fn resyncs_past_garbage_preceding_a_valid_frame() {
    let mut engine = Engine::new(Config::default()).expect("engine");
    let in_svc = engine.add_service(&[localhost()], Direction::Input, ReadMode::BeastData).expect("listen input");
    let out_svc = engine.add_service(&[localhost()], Direction::Output, ReadMode::Ignore).expect("listen output");
    let in_addr = engine.service_local_addr(in_svc, 0).unwrap();
    let out_addr = engine.service_local_addr(out_svc, 0).unwrap();

    let reader = thread::spawn(move || {
        let mut sink = TcpStream::connect(out_addr).expect("connect sink");
        sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 64];
        let mut total = Vec::new();
        while total.len() < HEARTBEAT.len() {
            let n = sink.read(&mut buf).expect("read sink");
            if n == 0 {
                break;
            }
            total.extend_from_slice(&buf[..n]);
        }
        total
    });

    pump(&mut engine, Duration::from_millis(100));

    let mut source = TcpStream::connect(in_addr).expect("connect source");
    let mut sent = vec![0xFF, 0xEE, 0x00, 0x1A, b'9'];
    sent.extend_from_slice(&HEARTBEAT);
    source.write_all(&sent).expect("write garbage then frame");

    pump(&mut engine, Duration::from_millis(500));

    assert_eq!(reader.join().expect("reader thread"), HEARTBEAT);
}
