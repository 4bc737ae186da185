use clap::Parser;

use rediswatch_lib::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();
    rediswatch_lib::init_logging();

    if let Err(e) = rediswatch_lib::run(config).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
