mod display;
mod list;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use display::Printer;
use list::{booking_lines, delete_from_list, parse_booking_id};
use roombot_core::config::ClientConfig;
use roombot_core::types::BookingId;
use roombot_engine::engine::EngineError;
use roombot_engine::workflow::ConfirmOutcome;
use roombot_runtime::config_store::ConfigStore;
use roombot_runtime::defaults::apply_env_overrides;
use roombot_runtime::http_client::{HttpBookingClient, login};
use roombot_runtime::runtime_engine::build_runtime_from_config;
use roombot_runtime::secrets::{SecretKey, delete_secret, resolve_token, set_secret};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roombot", about = "Chat with the meeting-room booking assistant")]
struct Cli {
    /// Client configuration file (created with defaults when saved).
    #[arg(long, env = "ROOMBOT_CONFIG", default_value = "roombot.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive conversation (default).
    Chat,
    /// Sign in; the password is read from stdin.
    Login {
        #[arg(long)]
        username: String,
    },
    /// Forget the stored token.
    Logout,
    /// List your bookings.
    Bookings {
        /// Delete this booking first, without confirmation.
        #[arg(long, value_name = "ID")]
        delete: Option<i64>,
    },
    /// Write the effective configuration to the config file.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = ConfigStore::at_path(&cli.config);
    let cfg = apply_env_overrides(
        store
            .load_or_default()
            .with_context(|| format!("load config {}", cli.config.display()))?,
    );
    tracing::debug!(?cfg, "configuration loaded");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&cfg).await,
        Command::Login { username } => sign_in(&cfg, &username).await,
        Command::Logout => {
            delete_secret(SecretKey::AuthToken)?;
            println!("Déconnecté.");
            Ok(())
        }
        Command::Bookings { delete } => {
            let client = HttpBookingClient::from_config(&cfg, require_token()?)?;
            match delete {
                Some(id) => print_lines(delete_from_list(&client, BookingId(id)).await),
                None => print_lines(booking_lines(&client).await),
            }
            Ok(())
        }
        Command::InitConfig => {
            store.save(&cfg)?;
            println!("Configuration écrite dans {}", store.path().display());
            Ok(())
        }
    }
}

fn require_token() -> anyhow::Result<String> {
    resolve_token()?.ok_or_else(|| anyhow!("not signed in; run `roombot login --username <name>`"))
}

async fn sign_in(cfg: &ClientConfig, username: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Mot de passe: ").await?;
    stdout.flush().await?;

    let mut password = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut password)
        .await
        .context("read password")?;

    match login(cfg, username, password.trim_end_matches(['\r', '\n'])).await {
        Ok(resp) => {
            set_secret(SecretKey::AuthToken, &resp.token)?;
            tracing::info!(role = ?resp.role, "signed in");
            println!(
                "Connecté en tant que {}.",
                resp.username.as_deref().unwrap_or(username)
            );
            Ok(())
        }
        Err(e) => {
            tracing::debug!("login failed: {e:?}");
            Err(anyhow!("{e}"))
        }
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

async fn chat(cfg: &ClientConfig) -> anyhow::Result<()> {
    let token = require_token()?;
    // No speech recognition backend on the terminal; the voice toggle stays hidden.
    let mut rt = build_runtime_from_config(cfg, token, None)?;
    let mut printer = Printer::new(std::io::stdout().is_terminal());

    println!(
        "roombot: /confirm pour valider, /bookings pour la liste, /delete <id> pour supprimer, /quit pour sortir."
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"vous> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();

        let echo = match line.as_str() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/bookings" => {
                print_lines(booking_lines(rt.bookings.as_ref()).await);
                continue;
            }
            cmd if cmd.starts_with("/delete") => {
                match parse_booking_id(&cmd["/delete".len()..]) {
                    Some(id) => print_lines(delete_from_list(rt.bookings.as_ref(), id).await),
                    None => println!("Usage: /delete <id>"),
                }
                continue;
            }
            "/confirm" => {
                match rt.engine.confirm_pending().await {
                    Ok(ConfirmOutcome::Failed { kind, message }) => {
                        tracing::debug!("{} failed: {message}", kind.as_str());
                    }
                    Ok(ConfirmOutcome::Succeeded { .. }) => {}
                    Err(EngineError::NoPendingAction) => println!("Rien à confirmer."),
                    Err(e) => return Err(e.into()),
                }
                None
            }
            text => {
                rt.composer.set_input(text);
                match rt.composer.send().await {
                    Ok(_) => {}
                    Err(EngineError::SessionClosed) => break,
                    Err(e) => println!("{e}"),
                }
                Some(text.to_string())
            }
        };

        let drained = printer.drain(&mut rt.events, echo.as_deref());
        for l in &drained.lines {
            println!("{l}");
        }
        if drained.bookings_changed {
            print_lines(booking_lines(rt.bookings.as_ref()).await);
        }
    }

    rt.engine.shutdown().await;
    Ok(())
}
