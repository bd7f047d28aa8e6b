mod error;

use clap::{Parser, Subcommand};
use error::App;
use std::path::PathBuf;
use tokio::process::Command;
use zbus::{proxy, Connection};

type StdResult<T> = std::result::Result<T, App>;

#[proxy(
    interface = "org.watchparty.Control",
    default_service = "org.watchparty.Control",
    default_path = "/org/watchparty/Control"
)]
trait Control {
    async fn test_connection(&self) -> zbus::Result<()>;
    async fn begin(&self, path: &str) -> zbus::Result<()>;
    async fn progress(&self) -> zbus::Result<u8>;
    async fn is_running(&self) -> zbus::Result<bool>;
    async fn client_id(&self) -> zbus::Result<String>;
    async fn stop(&self) -> zbus::Result<()>;
    async fn quit(&self) -> zbus::Result<()>;
}

#[derive(Parser)]
#[command(name = "wpc", about = "Control the watchparty daemon.", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the watchparty daemon")]
    Start,

    #[command(about = "Join the room, downloading its content into DIR")]
    Begin {
        #[arg(help = "Download directory")]
        dir: PathBuf,
    },

    #[command(about = "Show the download progress")]
    Progress,

    #[command(about = "Show whether a session is running")]
    Status,

    #[command(about = "Stop the running session")]
    Stop,

    #[command(about = "Stop the session and shut the daemon down")]
    Quit,
}

#[tokio::main]
async fn main() -> StdResult<()> {
    let cli = Cli::parse();
    let connection = Connection::session().await?;
    let proxy = ControlProxy::new(&connection).await?;
    handle_command(cli, &proxy).await
}

async fn handle_command(cli: Cli, proxy: &ControlProxy<'_>) -> StdResult<()> {
    if let Commands::Start = cli.command {
        return start_daemon(proxy).await;
    }
    if !is_daemon_running(proxy).await {
        eprintln!("watchparty is not running, use `wpc start` first");
        return Ok(());
    }
    match cli.command {
        Commands::Start => Ok(()),
        Commands::Begin { dir } => begin(proxy, dir).await,
        Commands::Progress => {
            println!("Download progress: {}%", proxy.progress().await?);
            Ok(())
        }
        Commands::Status => {
            let state = if proxy.is_running().await? {
                "running"
            } else {
                "idle"
            };
            println!("Session {state}, client {}", proxy.client_id().await?);
            Ok(())
        }
        Commands::Stop => {
            proxy.stop().await?;
            println!("Session stopped");
            Ok(())
        }
        Commands::Quit => {
            proxy.quit().await?;
            println!("watchparty shutting down");
            Ok(())
        }
    }
}

async fn begin(proxy: &ControlProxy<'_>, dir: PathBuf) -> StdResult<()> {
    let dir = std::path::absolute(&dir)?;
    let path = dir
        .to_str()
        .ok_or_else(|| App::InvalidInput(format!("Path is not UTF-8: {}", dir.display())))?;
    if proxy.is_running().await? {
        println!("A session is already running");
        return Ok(());
    }
    match proxy.begin(path).await {
        Ok(()) => {
            println!("Session started in {path}");
            Ok(())
        }
        Err(zbus::Error::MethodError(_, Some(reason), _)) => {
            eprintln!("Cannot start session: {reason}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn is_daemon_running(proxy: &ControlProxy<'_>) -> bool {
    proxy.test_connection().await.is_ok()
}

async fn start_daemon(proxy: &ControlProxy<'_>) -> StdResult<()> {
    if is_daemon_running(proxy).await {
        println!("watchparty is already running");
        return Ok(());
    }

    let current_exe_path = std::env::current_exe()?;
    let exe_dir = current_exe_path.parent().ok_or_else(|| {
        App::InvalidInput("Failed to get the directory of the executable".to_string())
    })?;
    let daemon_path = exe_dir.join("watchparty");

    if !daemon_path.exists() {
        return Err(App::InvalidInput(
            "watchparty executable not found in the same directory".to_string(),
        ));
    }

    let child = Command::new(daemon_path).spawn()?;
    println!("watchparty started, process ID: {:?}", child.id());
    Ok(())
}
