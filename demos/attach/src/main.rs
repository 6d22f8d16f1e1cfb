//! Attach to a remote session from the command line.
//!
//! Run with: cargo run -p attach-demo -- --session proj -u admin
//!
//! Lines typed on stdin are submitted as commands. `/keys <text>` sends raw
//! keystrokes, `/quit` detaches.

use std::{io::Write as _, sync::Arc};

use anyhow::{Context as _, bail};
use clap::Parser;
use remote_code_client::{ClientConfig, FileTokenStore, MemoryTokenStore, RemoteClient};
use remote_code_core::{AuthApi as _, TokenStore};
use remote_code_transport::{ReconnectPolicy, ServerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Attach to a remote-code session")]
struct Args {
    /// Session to attach to. Created if it does not exist.
    #[arg(short, long)]
    session: String,

    /// Working directory for a newly created session.
    #[arg(long)]
    work_dir: Option<String>,

    #[arg(short, long, env = "REMOTE_CODE_USER")]
    username: Option<String>,

    #[arg(long, env = "REMOTE_CODE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Full API base URL. Overrides REMOTE_CODE_API_URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Backend port. Overrides REMOTE_CODE_BACKEND_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Re-dial with backoff when the channel drops.
    #[arg(long)]
    reconnect: bool,

    /// Keep the token in memory only.
    #[arg(long)]
    no_persist: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if args.api_url.is_some() {
        config.api_url.clone_from(&args.api_url);
    }
    if args.port.is_some() {
        config.backend_port = args.port;
    }

    let store: Arc<dyn TokenStore> = if args.no_persist {
        Arc::new(MemoryTokenStore::new())
    } else {
        Arc::new(FileTokenStore::default_location()?)
    };
    let client = RemoteClient::new(&config, store)?;
    tracing::info!(api = %client.endpoints().api_base, "Using backend");

    ensure_login(&client, &args).await?;

    let sessions = client.sessions();
    sessions.list().await.context("listing sessions")?;
    let session = match sessions.select(&args.session) {
        Some(session) => session,
        None => {
            let created = sessions
                .create(&args.session, args.work_dir.as_deref())
                .await
                .context("creating session")?;
            sessions.set_current(Some(created.clone()));
            created
        }
    };
    tracing::info!(session = %session.name, work_dir = %session.work_dir, "Attaching");

    let mut builder = client.channel(&session.name);
    if args.reconnect {
        builder = builder.reconnect(ReconnectPolicy::default());
    }
    let channel = builder.build();

    channel.router().on_message(|msg| {
        match &msg.event {
            ServerEvent::Output { text, .. } => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{text}")?;
                stdout.flush()?;
            }
            ServerEvent::Status(status) => tracing::debug!("{status}"),
            ServerEvent::Error(error) => tracing::error!("Server error: {error}"),
            ServerEvent::Kicked(reason) => tracing::warn!("Detached by server: {reason}"),
            ServerEvent::Pong => {}
        }
        Ok(())
    });
    channel.router().on_disconnect(|| {
        tracing::info!("Channel closed");
        Ok(())
    });

    channel.connect().await.context("connecting to session")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line == "/quit" {
                    break;
                }
                let sent = match line.strip_prefix("/keys ") {
                    Some(keys) => channel.send_keys(keys),
                    None if line.trim().is_empty() => continue,
                    None => channel.send_command(line.as_str()),
                };
                if !sent {
                    tracing::warn!("Not connected, input dropped");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    channel.close();
    Ok(())
}

async fn ensure_login(client: &RemoteClient, args: &Args) -> anyhow::Result<()> {
    if client.auth().token().is_some() {
        if client.api().validate().await.is_ok() {
            return Ok(());
        }
        tracing::info!("Stored token rejected");
    }

    let (Some(username), Some(password)) = (&args.username, &args.password) else {
        bail!("not logged in: pass --username and --password (or REMOTE_CODE_PASSWORD)");
    };
    let login = client
        .login(username, password)
        .await
        .context("logging in")?;
    tracing::info!(user = %login.username, "Logged in");
    Ok(())
}
