mod common;

use std::{
    io::{Read, Write},
    net::TcpStream,
    thread,
    time::Duration,
};

use beast_net::{Config, Direction, Engine, ReadMode};
use common::pump;

fn localhost() -> std::net::SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn type2_frame(tag_byte: u8) -> [u8; 14] {
    // Type '2' frame: 7 meta bytes + 7 payload bytes. The last payload byte
    // carries `tag_byte` so frames in a burst can be told apart downstream.
    [0x1A, b'2', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, tag_byte]
}

#[test]
fn every_frame_reaches_every_output_client_in_order() {
    let mut engine = Engine::new(Config { flush_size_bytes: 1, ..Config::default() }).expect("engine");
    let in_svc = engine.add_service(&[localhost()], Direction::Input, ReadMode::BeastData).expect("listen input");
    let out_svc = engine.add_service(&[localhost()], Direction::Output, ReadMode::Ignore).expect("listen output");
    let in_addr = engine.service_local_addr(in_svc, 0).unwrap();
    let out_addr = engine.service_local_addr(out_svc, 0).unwrap();

    const FRAME_COUNT: u8 = 20;

    let readers: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(move || {
                let mut sink = TcpStream::connect(out_addr).expect("connect sink");
                sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
                let mut buf = [0u8; 4096];
                let mut total = Vec::new();
                while total.len() < 14 * FRAME_COUNT as usize {
                    let n = sink.read(&mut buf).expect("read sink");
                    if n == 0 {
                        break;
                    }
                    total.extend_from_slice(&buf[..n]);
                }
                total
            })
        })
        .collect();

    pump(&mut engine, Duration::from_millis(100));

    let mut source = TcpStream::connect(in_addr).expect("connect source");
    let mut burst = Vec::new();
    for i in 0..FRAME_COUNT {
        burst.extend_from_slice(&type2_frame(i));
    }
    source.write_all(&burst).expect("write burst");

    pump(&mut engine, Duration::from_millis(800));

    for reader in readers {
        let got = reader.join().expect("reader thread");
        assert_eq!(got, burst, "frames must arrive complete and in order");
    }
}
