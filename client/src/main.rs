use clap::Parser;
use client::auth::{AuthClient, CharacterInfo};
use client::controller::InputSample;
use client::session::WorldSession;
use client::world::WorldState;
use log::{info, warn};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the HTTP auth service
    #[arg(long, default_value = "http://localhost:8080")]
    http_url: String,

    /// URL of the world WebSocket endpoint
    #[arg(long, default_value = "ws://localhost:8080/v1/world/ws")]
    ws_url: String,

    /// Account name
    #[arg(short, long)]
    username: String,

    /// Account password
    #[arg(short, long)]
    password: String,

    /// Register a new account instead of logging in
    #[arg(long)]
    register: bool,

    /// Character name to play; defaults to the first on the roster
    #[arg(long)]
    character: Option<String>,

    /// Class used when the roster is empty and a character must be created
    #[arg(long, default_value = "Warrior")]
    class: String,

    /// Simulation ticks per second
    #[arg(long, default_value = "60")]
    tick_rate: u32,
}

fn pick_character(
    auth: &AuthClient,
    token: &str,
    wanted: Option<&str>,
    class: &str,
) -> Option<CharacterInfo> {
    let roster = auth.fetch_characters(token);
    match wanted {
        Some(name) => roster.into_iter().find(|c| c.name == name),
        None => match roster.into_iter().next() {
            Some(character) => Some(character),
            None => {
                info!("Empty roster, creating a default character");
                auth.create_character(token, "Adventurer", class)
            }
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Auth service: {}", args.http_url);
    info!("World socket: {}", args.ws_url);

    let auth = AuthClient::new(&args.http_url);
    let result = if args.register {
        auth.register(&args.username, &args.password)
    } else {
        auth.login(&args.username, &args.password)
    };
    if !result.ok {
        return Err(result.message.into());
    }
    info!("Authenticated as {}", args.username);

    let character = pick_character(&auth, &result.token, args.character.as_deref(), &args.class)
        .ok_or("No playable character available")?;
    info!("Playing {} the {}", character.name, character.class);

    let mut session = WorldSession::new(&args.ws_url, &result.token, character);
    if !session.start() {
        warn!("Initial connect failed, supervisor will retry");
    }

    let world = session.world();
    let tick = Duration::from_millis(1000 / args.tick_rate.max(1) as u64);
    let mut last_tick = Instant::now();
    let mut last_chat_ms = 0u64;
    let mut last_status = String::new();
    let mut last_error = String::new();

    // Headless fixed-timestep loop: the same cadence a render loop would
    // drive, minus the drawing.
    loop {
        let now = Instant::now();
        let dt = (now - last_tick).as_secs_f32();
        last_tick = now;

        session.tick(dt, &InputSample::default(), WorldState::now_ms());

        let snapshot = world.snapshot();
        if snapshot.status_line != last_status {
            info!("Connection: {}", snapshot.status_line);
            last_status = snapshot.status_line.clone();
        }
        for line in snapshot.chat_lines.iter() {
            if line.created_at_ms > last_chat_ms {
                info!("[chat] {}", line.text);
                last_chat_ms = last_chat_ms.max(line.created_at_ms);
            }
        }
        if let Some(error) = snapshot.errors.back() {
            if *error != last_error {
                warn!("[server error] {error}");
                last_error = error.clone();
            }
        }

        std::thread::sleep(tick);
    }
}
