use actix_web::{middleware::Logger, web, App, HttpServer};
use cinegraph::config::{Backend, Config};
use cinegraph::database::{MemoryDb, SledDb, Storage};
use cinegraph::{api, Cinegraph};
use log::info;

fn to_io_error(err: cinegraph::error::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

async fn serve<S: Storage + 'static>(storage: S, config: &Config) -> std::io::Result<()> {
    let core = web::Data::new(Cinegraph::new(storage));
    info!("Listening on {} with {:?} backend", config.bind, config.backend);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(core.clone())
            .configure(api::configure::<S>)
    })
    .bind(&config.bind)?
    .run()
    .await
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("cinegraph=debug,actix_web=info"),
    )
    .init();

    let config = Config::load().map_err(to_io_error)?;
    match config.backend {
        Backend::Memory => serve(MemoryDb::new(), &config).await,
        Backend::Sled => {
            let db = if config.temporary {
                SledDb::temporary()
            } else {
                SledDb::open(&config.db_path)
            }
            .map_err(to_io_error)?;
            serve(db, &config).await
        }
    }
}
