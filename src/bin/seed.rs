//! Resets the database named by `DATABASE_URL` and loads a data set.
//!
//! Usage: `seed [DATA_DIR]` (defaults to `data`).

use news_api::db::seed::{seed, SeedData};
use news_api::{db, logging};
use std::env;
use std::process;
use tracing::error;

fn run(dir: &str) -> db::Result<()> {
    let data = SeedData::from_dir(dir)?;
    let pool = db::init_pool()?;
    let mut connection = pool.get()?;
    db::run_migrations(&mut connection)?;
    seed(&mut connection, &data)
}

fn main() {
    logging::init();
    let dir = env::args().nth(1).unwrap_or_else(|| "data".to_string());
    if let Err(e) = run(&dir) {
        error!(error = %e, dir = %dir, "seeding failed");
        process::exit(1);
    }
}
