//! Console driver for one gateway session.
//!
//! ```text
//! BOARDCAST_API_TOKEN=lip_... cargo run -p relay -- [config.toml]
//! > new 3 white
//! > move e2e4
//! > resign
//! ```
//!
//! Every fanned-out event is printed as one JSON line.

use boardcast::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "commands: new [level] [white|black|random], move <uci>, resign, \
                    status, reset, account, sessions, quit";

#[tokio::main]
async fn main() -> Result<(), BoardcastError> {
    init_tracing("info,boardcast=debug").ok();

    let config = match std::env::args().nth(1) {
        Some(path) => GatewayConfig::load(path)?,
        None => {
            let mut config = GatewayConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            config
        }
    };

    let gateway = Gateway::https(config)?;
    let maintenance = gateway.spawn_maintenance();

    let mut events = gateway.subscribe();
    tokio::spawn(async move {
        while let Some(message) = events.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "unprintable event"),
            }
        }
    });

    let local = std::net::IpAddr::from([127, 0, 0, 1]);
    let session = gateway.create_session(local).await?;
    println!("session {session}. {HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => continue,
            ["quit" | "exit"] => break,
            ["new", rest @ ..] => match parse_params(rest) {
                Ok(params) => gateway.create_game(&session, params).await.map(print_submitted),
                Err(msg) => {
                    println!("{msg}");
                    continue;
                }
            },
            ["move", uci] => gateway.make_move(&session, uci).await.map(print_submitted),
            ["resign"] => gateway.resign(&session).await.map(print_submitted),
            ["reset"] => gateway.reset(&session).await,
            ["status"] => gateway
                .status(&session)
                .await
                .map(|status| print_json(&status)),
            ["account"] => gateway
                .check_account()
                .await
                .map(|account| println!("logged in as {}", account.username)),
            ["sessions"] => {
                print_json(&gateway.sessions_overview().await);
                Ok(())
            }
            _ => {
                println!("{HELP}");
                continue;
            }
        };

        if let Err(e) = result {
            let kind = if e.is_usage() { "rejected" } else { "error" };
            println!("{kind}: {e}");
        }
    }

    gateway.shutdown().await;
    maintenance.abort();
    Ok(())
}

fn parse_params(args: &[&str]) -> Result<CreateGameParams, String> {
    let mut params = CreateGameParams::default();
    if let Some(level) = args.first() {
        params.level = level
            .parse()
            .map_err(|_| format!("level must be a number, got {level:?}"))?;
    }
    if let Some(color) = args.get(1) {
        params.color = match *color {
            "white" => Color::White,
            "black" => Color::Black,
            "random" => Color::Random,
            other => return Err(format!("unknown color {other:?}")),
        };
    }
    Ok(params)
}

fn print_submitted(submitted: Submitted) {
    match submitted {
        Submitted::Accepted => println!("accepted"),
        Submitted::Queued { position } => println!("queued at {position}"),
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("error: {e}"),
    }
}
