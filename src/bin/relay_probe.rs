use std::time::Duration;
use std::{env, process};

use teleop_relay::client::{RelayClient, RelayClientError};
use teleop_relay::clock_sync::SYNC_WINDOW;
use teleop_relay::relay::PeerRole;

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws/data";
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

struct ProbeArgs {
    url: String,
    role: PeerRole,
    samples: usize,
    interval: Duration,
}

fn main() {
    let args = parse_args();

    if let Err(e) = run(&args) {
        eprintln!("[relay_probe] {e}");
        process::exit(1);
    }
}

fn run(args: &ProbeArgs) -> Result<(), RelayClientError> {
    let mut client = RelayClient::connect(&args.url, args.role, EXCHANGE_TIMEOUT)?;
    println!("connected to {} as {} ({})", args.url, client.peer_id(), client.role());

    for i in 0..args.samples {
        if i > 0 {
            std::thread::sleep(args.interval);
        }
        let sample = client.sync_clock_once(EXCHANGE_TIMEOUT)?;
        println!(
            "sample {:>3}: offset {:>9.1} ms  rtt {:>5} ms",
            i + 1,
            sample.offset_ms,
            sample.round_trip_ms
        );
    }

    let est = client.estimator();
    println!(
        "median of last {}: offset {:.1} ms, rtt {} ms, synced: {}",
        est.sample_count().min(SYNC_WINDOW),
        est.offset_ms(),
        est.round_trip_ms(),
        est.is_synced()
    );

    client.close()
}

fn parse_args() -> ProbeArgs {
    let mut it = env::args();
    let program = it.next().unwrap_or_else(|| "relay_probe".to_owned());

    let mut args = ProbeArgs {
        url: DEFAULT_URL.to_owned(),
        role: PeerRole::Controller,
        samples: 5,
        interval: Duration::from_millis(200),
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--role" => args.role = PeerRole::from_hint(Some(&value(&mut it, &program))),
            "--samples" => args.samples = parse_number(&value(&mut it, &program), &program) as usize,
            "--interval-ms" => {
                args.interval = Duration::from_millis(parse_number(&value(&mut it, &program), &program));
            }
            "-h" | "--help" => usage(&program),
            other if !other.starts_with('-') => args.url = other.to_owned(),
            _ => usage(&program),
        }
    }
    args
}

fn value(it: &mut impl Iterator<Item = String>, program: &str) -> String {
    it.next().unwrap_or_else(|| usage(program))
}

fn parse_number(raw: &str, program: &str) -> u64 {
    raw.parse().unwrap_or_else(|_| usage(program))
}

fn usage(program: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {program} [URL] [--role controller|consumer] [--samples N] [--interval-ms MS]");
    eprintln!();
    eprintln!("Defaults: URL {DEFAULT_URL}, role controller, 5 samples, 200 ms apart.");
    process::exit(1);
}
