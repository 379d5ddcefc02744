use std::sync::Arc;
use std::{env, process};

use teleop_relay::config::{Config, RelayConfig};
use teleop_relay::log::log_sink::LogSink;
use teleop_relay::log::logger::Logger;
use teleop_relay::protocol::{
    ACK_SIZE, CLOCK_SYNC_REQUEST_SIZE, CLOCK_SYNC_RESPONSE_SIZE, COMMAND_SIZE, RELAYED_ACK_SIZE,
    RELAYED_COMMAND_SIZE,
};
use teleop_relay::relay::RelayServer;

const CONFIG_ENV: &str = "TELEOP_RELAY_CONFIG";

fn main() -> std::io::Result<()> {
    // --- Parse CLI args ----------------------------------------------------
    //
    // Supported:
    //   relay_server                         -> settings from config / defaults
    //   relay_server --config relay.conf     -> explicit config file
    //   relay_server 0.0.0.0:9000            -> override listen address
    //   relay_server 127.0.0.1 9000          -> override listen address
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "relay_server".to_owned());
    let mut args: Vec<String> = args.collect();

    let mut config_path = env::var(CONFIG_ENV).ok();
    if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            usage(&program);
        }
        config_path = Some(args.remove(1));
        args.remove(0);
    }

    let addr_override = match args.as_slice() {
        [] => None,
        [addr] => Some(addr.clone()),
        [ip, port] => Some(format!("{ip}:{port}")),
        _ => usage(&program),
    };

    // --- Load configuration ------------------------------------------------
    let config = match config_path.as_deref() {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            eprintln!("[relay_server] {e}");
            process::exit(1);
        }),
        None => Config::empty(),
    };

    let mut relay_config = RelayConfig::from_config(&config).unwrap_or_else(|e| {
        eprintln!("[relay_server] invalid configuration: {e}");
        process::exit(1);
    });
    if let Some(addr) = addr_override {
        relay_config.listen_addr = addr;
    }
    if let Ok(port) = env::var("PORT") {
        relay_config = relay_config.with_port(&port);
    }

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start_server(1024, &config);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    let server = RelayServer::bind(relay_config, log_sink)?;
    let local = server.local_addr()?;

    eprintln!("[relay_server] listening on ws://{}{}", local, server.config().ws_path);
    eprintln!("[relay_server] log file: {}", logger.file_path().display());
    eprintln!(
        "[relay_server] command {COMMAND_SIZE}B -> {RELAYED_COMMAND_SIZE}B, ack {ACK_SIZE}B -> {RELAYED_ACK_SIZE}B, clock sync {CLOCK_SYNC_REQUEST_SIZE}B -> {CLOCK_SYNC_RESPONSE_SIZE}B"
    );

    // --- Run relay (blocks) ------------------------------------------------
    server.run()
}

fn usage(program: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {program}                       # settings from ${CONFIG_ENV} or defaults");
    eprintln!("  {program} --config <path>       # INI config file");
    eprintln!("  {program} [ADDR]                # e.g. 0.0.0.0:8080");
    eprintln!("  {program} [IP] [PORT]           # e.g. 127.0.0.1 8080");
    eprintln!();
    eprintln!("The PORT environment variable overrides the listen port.");
    process::exit(1);
}
