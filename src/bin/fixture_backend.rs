//! Fixture Backend
//!
//! Serves canned profiles from FIXTURE_DIR on the profiler routes.
//! Run with: cargo run --bin fixture_backend

use anyhow::Result;
use profview::config::Config;
use profview::fixture_server::{FixtureServer, PPROF_FILE, TEXT_FILE, TIMELINE_FILE};
use profview::logging::{self, obj, v_str, Domain};

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let server = FixtureServer::bind(&format!("127.0.0.1:{}", cfg.fixture_port), &cfg.fixture_dir)?;
    let addr = server.local_addr()?;

    println!("Fixture backend running at http://{}", addr);
    println!();
    println!("Endpoints:");
    println!("  GET /check                - Liveness");
    println!("  GET /profile?options=...  - {} | {} | {}", TEXT_FILE, PPROF_FILE, TIMELINE_FILE);
    println!();

    logging::info(
        Domain::Server,
        "listening",
        obj(&[
            ("run_id", v_str(logging::run_id())),
            ("addr", v_str(&addr.to_string())),
            ("dir", v_str(&cfg.fixture_dir.display().to_string())),
        ]),
    );
    server.serve_forever();
    Ok(())
}
