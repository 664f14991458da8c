use hyper::{
    service::{make_service_fn, service_fn},
    Server,
};
use server::{app::App, entry_point, AppSettings, Webserver};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[derive(StructOpt, Debug, Clone)]
pub struct Opts {
    #[structopt(long, default_value = "3000", env = "ACCOUNTS_LISTEN_PORT")]
    port: u16,
    #[structopt(
        long,
        default_value = "sqlite://accounts.db",
        env = "ACCOUNTS_DATABASE_ADDR"
    )]
    database_addr: String,
    #[structopt(long, default_value = "5", env = "ACCOUNTS_DATABASE_MAX_CONNECTIONS")]
    database_max_connections: u32,
    #[structopt(long, default_value = "uploads", env = "ACCOUNTS_UPLOADS_DIR")]
    uploads_dir: PathBuf,
}

impl From<Opts> for AppSettings {
    fn from(opts: Opts) -> Self {
        Self {
            port: opts.port,
            database_addr: opts.database_addr,
            database_max_connections: opts.database_max_connections,
            uploads_dir: opts.uploads_dir,
        }
    }
}

#[tokio::main]
async fn main() {
    let env = std::env::var("ACCOUNTS_ENV").unwrap_or_else(|_| "test".to_string());
    let env_file = format!("{}.env", env);
    let env_file_missing = dotenv::from_filename(&env_file).is_err();

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    if env_file_missing {
        warn!(
            "'{}' not present in {:?}, using process environment only",
            env_file,
            std::env::current_dir().unwrap_or_default()
        );
    }

    let settings = AppSettings::from(Opts::from_args());
    debug!("settings: {:?}", settings);

    let app = match App::new(&settings).await {
        Ok(app) => Arc::new(app),
        Err(error) => {
            error!(
                "failed to start application: {} (context: {:?})",
                error, error.context
            );
            std::process::exit(1);
        }
    };

    let webserver = Arc::new(Webserver::new(app));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    let service = make_service_fn(|_| {
        let webserver = webserver.clone();
        async {
            Ok::<_, hyper::Error>(service_fn(move |request| {
                let webserver = webserver.clone();
                entry_point(webserver, request)
            }))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(service),
        Err(bind_error) => {
            error!("failed to bind to {}: {}", addr, bind_error);
            std::process::exit(1);
        }
    };

    info!("server is running on http://{}", addr);

    let server = server.with_graceful_shutdown(async {
        if let Err(signal_error) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {}", signal_error);
        }
        info!("shutting down");
    });

    if let Err(server_error) = server.await {
        error!("server error: {}", server_error);
    }
}
