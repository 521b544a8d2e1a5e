use std::io::{self, BufRead};
use std::net::{SocketAddr, ToSocketAddrs};
use std::process::ExitCode;
use std::sync::Arc;

use prtp::{run_client_session, Config, UdpEndpoint};

fn usage() -> ! {
    eprintln!("Usage: client <host> <port> [max_window_segs]");
    std::process::exit(1);
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let host = &args[1];
    let port: u16 = match args[2].parse() {
        Ok(p) => p,
        Err(_) => usage(),
    };
    let max_window_segs: u32 = match args.get(3) {
        Some(s) => match s.parse() {
            Ok(n) => n,
            Err(_) => usage(),
        },
        None => 64,
    };

    let peer: SocketAddr = match (host.as_str(), port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                eprintln!("could not resolve {host}:{port}");
                return ExitCode::FAILURE;
            }
        },
        Err(e) => {
            eprintln!("could not resolve {host}:{port}: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Input lowercase sentence: ");
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        eprintln!("failed to read input");
        return ExitCode::FAILURE;
    }
    let message = line.trim_end_matches(['\n', '\r']).as_bytes();

    let config = Config {
        max_window_segs,
        ..Config::default()
    };

    let endpoint = match UdpEndpoint::bind("0.0.0.0:0") {
        Ok(ep) => Arc::new(ep),
        Err(e) => {
            eprintln!("could not open socket: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_client_session(endpoint, peer, config, message) {
        Ok(sender) => {
            println!(
                "sent {} bytes, final cwnd={:.2}, state={:?}",
                message.len(),
                sender.cwnd(),
                sender.congestion_state()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("session failed: {e}");
            ExitCode::FAILURE
        }
    }
}
