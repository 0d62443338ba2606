//! sogo CLI — tutoring server and terminal client.
//!
//! ```text
//! sogo serve [--host 0.0.0.0] [--port 7860] [--config sogo.toml]
//! sogo start --goal "Cricket Game" [--module ...]   [--server ... --user ...]
//! sogo chat --goal "Cricket Game" --module "The Stadium (I/O)" "print is for output?"
//! sogo run game.py [--review --goal ... --module ...]
//! sogo curriculum / labs / progress / finder / quiz patterns
//! sogo voice [--goal "English Adventure"] [--module "Level 0: The Explorer"]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use sogo_lib::capture::AudioCapture;
use sogo_lib::client::ApiClient;
use sogo_lib::config::Config;
use sogo_lib::playback::{PlaybackEnd, Player};
use sogo_lib::server::router;
use sogo_lib::service::TutorService;
use sogo_lib::sogo_core::code_policy::review_message;
use sogo_lib::sogo_core::curriculum::{ENGLISH_ADVENTURE, ENGLISH_ENTRY_MODULE};
use sogo_lib::sogo_core::finder::Recommendation;
use sogo_lib::sogo_core::types::{ChatRequest, StartModuleRequest};
use sogo_lib::voice::{VoiceEvent, VoiceSession};

/// sogo — Socratic coding and English tutor
#[derive(Parser)]
#[command(name = "sogo", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Where to reach the server and who is asking.
#[derive(Args)]
struct Remote {
    /// Tutoring server URL
    #[arg(long, env = "SOGO_SERVER", default_value = "http://localhost:7860")]
    server: String,
    /// Learner id
    #[arg(long, env = "SOGO_USER", default_value = "guest")]
    user: String,
}

impl Remote {
    fn client(&self) -> ApiClient {
        ApiClient::new(&self.server)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the tutoring server
    Serve {
        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List coding tracks and their modules
    Curriculum {
        #[command(flatten)]
        remote: Remote,
    },
    /// Show the labs catalog
    Labs {
        #[command(flatten)]
        remote: Remote,
    },
    /// Open a module and print the tutor's first message
    Start {
        #[arg(long)]
        goal: String,
        /// Module to open instead of the saved one
        #[arg(long)]
        module: Option<String>,
        #[command(flatten)]
        remote: Remote,
    },
    /// Send one message to the tutor
    Chat {
        #[arg(long)]
        goal: String,
        #[arg(long)]
        module: String,
        message: String,
        #[command(flatten)]
        remote: Remote,
    },
    /// Run a Python file in the sandbox
    Run {
        file: PathBuf,
        /// Ask the tutor to review the code and its output
        #[arg(long, requires_all = ["goal", "module"])]
        review: bool,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        module: Option<String>,
        #[command(flatten)]
        remote: Remote,
    },
    /// Show saved progress and skill XP
    Progress {
        #[command(flatten)]
        remote: Remote,
    },
    /// Walk the lab finder dialog
    Finder {
        #[command(flatten)]
        remote: Remote,
    },
    /// Career quiz: patterns, stories or both
    Quiz {
        choice: String,
        #[command(flatten)]
        remote: Remote,
    },
    /// Push-to-talk voice tutor
    Voice {
        #[arg(long, default_value = ENGLISH_ADVENTURE)]
        goal: String,
        #[arg(long, default_value = ENGLISH_ENTRY_MODULE)]
        module: String,
        /// TTS voice
        #[arg(long)]
        voice: Option<String>,
        #[command(flatten)]
        remote: Remote,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sogo_lib=info,sogo_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, config } => serve(host, port, config).await,

        Command::Curriculum { remote } => print_json(&remote.client().curriculum().await?),
        Command::Labs { remote } => print_json(&remote.client().labs().await?),
        Command::Quiz { choice, remote } => {
            print_json(&remote.client().career_quiz(&choice).await?)
        }
        Command::Progress { remote } => {
            print_json(&remote.client().progress(&remote.user).await?)
        }

        Command::Start {
            goal,
            module,
            remote,
        } => {
            let resp = remote
                .client()
                .start_module(&StartModuleRequest {
                    user_id: remote.user.clone(),
                    goal,
                    module_name: module,
                })
                .await?;
            println!("[{}]  {}", resp.module, resp.all_modules.join(" → "));
            println!("{}", resp.intro_message);
            Ok(())
        }

        Command::Chat {
            goal,
            module,
            message,
            remote,
        } => chat(&remote, goal, module, message).await,

        Command::Run {
            file,
            review,
            goal,
            module,
            remote,
        } => {
            let code = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let output = remote.client().run_code(&code, &remote.user).await?.output;
            println!("{output}");
            if let (true, Some(goal), Some(module)) = (review, goal, module) {
                chat(&remote, goal, module, review_message(&code, &output)).await?;
            }
            Ok(())
        }

        Command::Finder { remote } => finder(&remote.client()).await,

        Command::Voice {
            goal,
            module,
            voice,
            remote,
        } => voice_loop(&remote, goal, module, voice).await,
    }
}

async fn serve(host: Option<String>, port: Option<u16>, config: Option<PathBuf>) -> Result<()> {
    let mut config = Config::load_from(config)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let service = TutorService::from_config(&config)?;
    let app = router(service);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("sogo listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(remote: &Remote, goal: String, module: String, message: String) -> Result<()> {
    let resp = remote
        .client()
        .chat(&ChatRequest {
            user_id: remote.user.clone(),
            message,
            history: Vec::new(),
            module_name: module,
            goal,
        })
        .await?;
    println!("{}", resp.response);
    if resp.module_complete {
        println!("\n✔ Module complete. Next: {}", resp.next_module);
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}

async fn finder(api: &ApiClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut reply = api.lab_finder("").await?;

    loop {
        println!("{}", reply.content);
        let options = reply.options;
        if options.is_empty() {
            match reply.recommendation {
                Some(Recommendation::Python) => println!("→ Recommended lab: Python"),
                Some(Recommendation::English) => println!("→ Recommended lab: English"),
                None => {}
            }
            return Ok(());
        }
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option.label);
        }

        let picked = loop {
            let Some(line) = read_line(&mut lines).await? else {
                return Ok(());
            };
            match line.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => break n - 1,
                _ => println!("Pick 1-{}", options.len()),
            }
        };
        reply = api.lab_finder(&options[picked].value).await?;
    }
}

enum Input {
    Line(Option<String>),
    Played(std::result::Result<sogo_lib::Result<PlaybackEnd>, tokio::task::JoinError>),
}

async fn voice_loop(
    remote: &Remote,
    goal: String,
    module: String,
    voice: Option<String>,
) -> Result<()> {
    let player = Player::new()?;
    let mut session = VoiceSession::new(remote.client(), remote.user.clone(), goal, module)
        .with_events(|event| match event {
            VoiceEvent::Heard(text) => println!("you:  {text}"),
            VoiceEvent::Replied(text) => println!("sogo: {text}"),
            VoiceEvent::Failed(message) => println!("!     {message}"),
            VoiceEvent::Phase(phase) => debug!("voice phase: {phase:?}"),
        });
    if let Some(voice) = voice {
        session = session.with_voice(voice);
    }

    println!("sogo: {}", session.turn().reply());
    println!("Press Enter to talk, Enter again to send. Type q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut playing: Option<JoinHandle<sogo_lib::Result<PlaybackEnd>>> = None;

    loop {
        let input = match playing.as_mut() {
            Some(task) => tokio::select! {
                ended = task => Input::Played(ended),
                line = read_line(&mut lines) => Input::Line(line?),
            },
            None => Input::Line(read_line(&mut lines).await?),
        };

        let line = match input {
            Input::Played(ended) => {
                playing = None;
                if let Ok(Err(e)) = ended {
                    println!("!     cannot play reply: {e}");
                }
                session.playback_done()?;
                continue;
            }
            Input::Line(line) => line,
        };

        match line.as_deref() {
            None | Some("q") | Some("quit") => break,
            _ => {}
        }

        if playing.take().is_some() {
            player.stop();
        }
        session.press()?;
        let capture = AudioCapture::start()?;
        println!("… listening (Enter to send)");
        if read_line(&mut lines).await?.is_none() {
            break;
        }
        let samples = capture.finish();

        if let Some(wav) = session.submit(&samples).await? {
            let player = player.clone();
            playing = Some(tokio::spawn(async move { player.play(wav).await }));
        }
    }

    player.stop();
    Ok(())
}
