use news_api::{db, logging};
use std::process;
use tracing::{error, info};

fn prepare() -> db::Result<db::Pool> {
    let pool = db::init_pool()?;
    let mut connection = pool.get()?;
    db::run_migrations(&mut connection)?;
    Ok(pool)
}

#[rocket::main]
async fn main() {
    logging::init();

    let pool = match prepare() {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to prepare the database");
            process::exit(1);
        }
    };

    info!("starting news api");
    if let Err(e) = news_api::rocket(pool).launch().await {
        error!(error = %e, "server stopped with an error");
        process::exit(1);
    }
}
