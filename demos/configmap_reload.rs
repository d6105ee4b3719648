//! Example following a Kubernetes-style ConfigMap mount.
//!
//! This example shows how to:
//! - Register static and dynamic flags in a `FlagSet`
//! - Attach a validator and a change notifier to a dynamic flag
//! - Apply a mounted config directory and follow `..data` swaps
//!
//! Run with: cargo run --example configmap_reload [MOUNT_DIR]
//!
//! Without an argument the example builds a throwaway mount and swaps it
//! a few times itself. With one, point it at a real ConfigMap volume and
//! edit the ConfigMap to see reloads.

use dynflag::core::validators::{in_range, one_of};
use dynflag::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== ConfigMap Reload Example ===\n");

    let (_scratch, mount, simulate) = match std::env::args().nth(1) {
        Some(path) => (None, PathBuf::from(path), false),
        None => {
            let scratch = tempfile::TempDir::new()?;
            let mount = scratch.path().join("config");
            std::fs::create_dir(&mount)?;
            publish(&mount, "..v1", "100", "info")?;
            (Some(scratch), mount, true)
        }
    };

    let flags = Arc::new(FlagSet::new("configmap-demo"));
    let _listen_port = flags.add_static("listen_port", 8080u16, "port to bind")?;
    let rate_limit = flags
        .add_dynamic("rate_limit", 50u32, "requests per second per client")?
        .with_validator(in_range(1, 10_000))
        .with_notifier(|old, new| println!("[Event] rate_limit {} -> {}", old, new));
    let log_level = flags
        .add_dynamic("log_level", "warn".to_string(), "minimum log level")?
        .with_validator(one_of(["debug", "info", "warn", "error"]));

    let updater = Updater::builder(flags.clone(), &mount)
        .with_poll_interval(Duration::from_millis(500))
        .build()?;
    updater.initialize()?;
    updater.start()?;

    println!("Watching {}", mount.display());
    println!("Applied directory: {:?}\n", updater.resolved_dir());

    if simulate {
        for (version, rate, level) in [("..v2", "250", "debug"), ("..v3", "0", "error")] {
            tokio::time::sleep(Duration::from_secs(2)).await;
            println!("\nSwapping to {} (rate_limit={}, log_level={})", version, rate, level);
            publish(&mount, version, rate, level)?;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    } else {
        println!("Press Ctrl+C to exit\n");
        tokio::signal::ctrl_c().await?;
    }

    println!("\nFinal values: rate_limit={} log_level={}", rate_limit.get(), log_level.get());
    #[cfg(feature = "json")]
    println!("{}", flags.to_json()?);

    updater.shutdown().await?;
    Ok(())
}

/// Write a versioned directory and repoint `..data` at it.
#[cfg(unix)]
fn publish(mount: &Path, version: &str, rate: &str, level: &str) -> std::io::Result<()> {
    let dir = mount.join(version);
    std::fs::create_dir(&dir)?;
    std::fs::write(dir.join("rate_limit"), format!("{}\n", rate))?;
    std::fs::write(dir.join("log_level"), format!("{}\n", level))?;

    let staging = mount.join("..data_tmp");
    std::os::unix::fs::symlink(version, &staging)?;
    std::fs::rename(&staging, mount.join("..data"))
}

#[cfg(not(unix))]
fn publish(_mount: &Path, _version: &str, _rate: &str, _level: &str) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlink-swapped mounts need a unix host",
    ))
}
