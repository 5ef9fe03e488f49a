mod demo;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::net::TcpStream;

use scenelink::{AssetKind, Command, FrameWriter, Pose};

#[derive(Parser)]
#[command(name = "scenelink-client")]
#[command(about = "Streams scene commands to a scenelink server")]
struct Args {
    #[arg(
        short,
        long,
        default_value_t = format!("127.0.0.1:{}", scenelink::DEFAULT_PORT),
        help = "Server address to connect to"
    )]
    server: String,

    #[arg(long, help = "Send this mesh asset (.dae, .gltf, .glb) instead of the demo")]
    mesh: Option<PathBuf>,

    #[arg(short, long, default_value = "test_10")]
    experiment: String,

    #[arg(long, default_value_t = 100)]
    end_frame: u32,

    #[arg(long, default_value_t = 0, help = "Pause between commands in ms")]
    delay_ms: u64,

    #[arg(long, help = "Open a new connection for every command")]
    reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let commands = match &args.mesh {
        Some(path) => mesh_sequence(path, &args.experiment, args.end_frame)?,
        None => demo::demo_sequence(&mut rand::thread_rng(), &args.experiment, args.end_frame)?,
    };

    log::info!(
        "Sending {} commands to {}",
        commands.len(),
        args.server
    );

    let delay = Duration::from_millis(args.delay_ms);
    let mut writer: Option<FrameWriter<TcpStream>> = None;

    for command in &commands {
        if writer.is_none() {
            writer = Some(connect(&args.server).await?);
        }
        if let Some(w) = writer.as_mut() {
            let bytes = w
                .send(command)
                .await
                .with_context(|| format!("failed to send {} '{}'", command.kind(), command.subject()))?;
            log::info!("Sent {} '{}' ({} bytes)", command.kind(), command.subject(), bytes);
        }

        if args.reconnect {
            if let Some(mut w) = writer.take() {
                w.shutdown().await?;
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    if let Some(mut w) = writer {
        w.shutdown().await?;
    }
    log::info!("Done");
    Ok(())
}

async fn connect(addr: &str) -> Result<FrameWriter<TcpStream>> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    stream.set_nodelay(true)?;
    Ok(FrameWriter::new(stream))
}

fn mesh_sequence(path: &Path, experiment_name: &str, end_frame_index: u32) -> Result<Vec<Command>> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid mesh path {}", path.display()))?;
    let asset_kind = AssetKind::from_file_name(file_name)
        .ok_or_else(|| anyhow!("unsupported mesh asset {}", file_name))?;
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string();

    let mesh_asset =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    Ok(vec![
        Command::AddRigidBodyMesh {
            name,
            mesh_asset,
            asset_kind,
            init_pose: Pose::IDENTITY,
        },
        Command::FinishAnimation {
            experiment_name: experiment_name.to_string(),
            end_frame_index,
        },
    ])
}
