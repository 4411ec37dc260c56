/*!
 * AI-OS VFS Daemon - Main Entry Point
 *
 * Loads the filesystem configuration, mounts the configured mountpoints and
 * keeps their watches running until interrupted.
 *
 * Environment variables:
 * - VFS_CONFIG: path to a JSON configuration file
 * - VFS_STORAGE_PATH: host root of the default `home` mount
 */

use anyhow::{Context, Result};
use tracing::{info, warn};

use ai_os_vfs::{init_tracing, Filesystem, MountSpec, VfsConfig};

fn load_config() -> Result<VfsConfig> {
    let config = match std::env::var("VFS_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration");
            VfsConfig::from_file(&path).with_context(|| format!("loading {}", path))?
        }
        Err(_) => {
            let storage = std::env::var("VFS_STORAGE_PATH")
                .unwrap_or_else(|_| "/tmp/ai-os-vfs".to_string());
            if let Err(e) = std::fs::create_dir_all(&storage) {
                warn!(error = %e, "Could not create storage directory");
            }
            VfsConfig::default()
                .with_mount(
                    MountSpec::new("home")
                        .with_root(format!("{}/{{username}}", storage))
                        .watched(),
                )
                .with_mount(MountSpec::new("tmp").with_adapter("memory"))
        }
    };

    Ok(config.apply_env())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("AI-OS VFS starting...");

    let config = load_config()?;
    let filesystem = Filesystem::builder().with_config(config).build();

    let mounted = filesystem.init().await;
    for mountpoint in filesystem.mountpoints() {
        info!(
            mountpoint = %mountpoint.name,
            root = mountpoint.attributes.root.as_deref().unwrap_or(&mountpoint.root),
            watching = filesystem.watches().is_watching(mountpoint.id),
            "Mountpoint ready"
        );
    }
    info!(mounted, "VFS ready, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    info!("Shutting down");
    filesystem.destroy().await;
    Ok(())
}
