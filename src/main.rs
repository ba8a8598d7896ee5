mod config;
mod error;
mod identity;
mod outbound;
mod protocol;
mod room;
mod server;
mod session;
mod utils;
mod wire;

#[actix::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = config::Config::from_env();
    server::http::start(config).await
}
