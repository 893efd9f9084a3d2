// src/commands/server.rs
//! Server commands (init, serve)

use anyhow::Result;
use tracing::info;

/// Create or migrate the database and make sure the root user exists
pub fn cmd_init(db_path: &str) -> Result<()> {
    info!("Initializing pushreq database at: {}", db_path);
    pushreq::db::init(db_path)?;
    let mut conn = pushreq::db::open(db_path)?;
    pushreq::index::service::ensure_root_user(&mut conn, pushreq::index::DEFAULT_ROOT_USER)?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}

/// Run the HTTP server
#[cfg(feature = "server")]
pub fn cmd_serve(config: Option<&str>, bind: Option<&str>, db_path: Option<&str>) -> Result<()> {
    use anyhow::Context;
    use pushreq::server::{PushreqConfig, run_server};
    use std::path::{Path, PathBuf};

    let file_config = match config {
        Some(path) => PushreqConfig::load(Path::new(path))?,
        None => PushreqConfig::default(),
    };
    let mut server_config = file_config.to_server_config()?;
    if let Some(bind) = bind {
        server_config.bind_addr = bind
            .parse()
            .with_context(|| format!("Invalid bind address: {bind}"))?;
    }
    if let Some(db_path) = db_path {
        server_config.db_path = PathBuf::from(db_path);
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_server(server_config))
}
