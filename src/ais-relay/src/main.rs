use ais_relay::{settings::Settings, startup::App};

#[tokio::main]
async fn main() {
    let settings = Settings::new().unwrap();

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level.as_tracing())
        .init();

    let app = App::build(&settings).await.unwrap();

    app.run().await.unwrap();
}
