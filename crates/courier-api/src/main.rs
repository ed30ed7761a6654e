use courier_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    courier_api::telemetry::init_telemetry();

    let config = Config::from_env()?;

    let (_state, router) = courier_api::setup::initialize_app(config.clone()).await?;

    courier_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
