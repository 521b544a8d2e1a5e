use std::process::ExitCode;

use prtp::{run_server_session, Config, UdpEndpoint};

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let port: u16 = match args.get(1) {
        Some(s) => match s.parse() {
            Ok(p) => p,
            Err(_) => {
                eprintln!("Usage: server [port]");
                return ExitCode::FAILURE;
            }
        },
        None => 12000,
    };

    let config = Config::default();

    loop {
        let endpoint = match UdpEndpoint::bind(("0.0.0.0", port)) {
            Ok(ep) => ep,
            Err(e) => {
                eprintln!("could not bind port {port}: {e}");
                return ExitCode::FAILURE;
            }
        };

        println!("waiting for a connection on port {port}...");
        match run_server_session(endpoint, config) {
            Ok(Some(bytes)) => {
                println!("received: {}", String::from_utf8_lossy(&bytes).to_uppercase())
            }
            Ok(None) => println!("session ended with no data"),
            Err(e) => eprintln!("session failed: {e}"),
        }
    }
}
