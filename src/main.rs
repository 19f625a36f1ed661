use tracing_subscriber::{fmt, EnvFilter};
use tracing::info;

use keygate::config::{has_flag, USAGE};
use keygate::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::load(&args);
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "keygate",
        "keygate starting: RUST_LOG='{}', http_port={}, db={:?}, bootstrap_admin={}",
        rust_log,
        config.http_port,
        config.snapshot_path,
        config.bootstrap_admin.as_ref().map(|(e, _)| e.as_str()).unwrap_or("<none>")
    );

    keygate::server::run(config).await
}
