mod config;
mod server;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use config::ServerConfig;
use scenelink::{DanglingPrevPolicy, MemoryHost};
use server::{RunOutcome, SceneServer};

#[derive(Parser)]
#[command(name = "scenelink-server")]
#[command(about = "Receives scene commands and authors the animated scene")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = scenelink::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value = "scenes", help = "Directory finished scenes are written to")]
    output_dir: PathBuf,

    #[arg(long, help = "Drop the connection after this many seconds without a frame")]
    idle_timeout: Option<u64>,

    #[arg(long, default_value_t = 512, help = "Largest accepted frame in MiB")]
    max_frame_mb: usize,

    #[arg(long, help = "Install frames whose previous frame is unknown instead of rejecting them")]
    lenient_prev_frame: bool,

    #[arg(long, help = "Exit when the first client disconnects")]
    single_connection: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        max_frame_size: args.max_frame_mb.saturating_mul(1024 * 1024),
        idle_timeout: args.idle_timeout.map(Duration::from_secs),
        output_dir: args.output_dir,
        dangling_prev: if args.lenient_prev_frame {
            DanglingPrevPolicy::SkipBackLink
        } else {
            DanglingPrevPolicy::Reject
        },
        single_connection: args.single_connection,
    };

    let host = MemoryHost::with_output_dir(&config.output_dir);
    let mut server = SceneServer::bind(&bind_addr, config, host).await?;
    log::info!("Server started on {}", server.local_addr()?);

    let result = server.run().await;
    log::info!("Server stats: {}", server.stats());

    match result? {
        RunOutcome::Finished {
            experiment_name,
            end_frame_index,
        } => {
            log::info!(
                "Finished '{}' at frame {}, shutting down",
                experiment_name,
                end_frame_index
            );
            Ok(())
        }
        RunOutcome::Disconnected => bail!("client disconnected before the animation was finished"),
    }
}
