use aws_config::BehaviorVersion;
use branch_amplitude_bridge::amplitude::client::AmplitudeClient;
use branch_amplitude_bridge::config;
use branch_amplitude_bridge::events::Webhook;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    branch_amplitude_bridge::set_up_logging();

    info!(
        "Initializing {} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mut config = config::Config::load_from_env()?;

    // an ARN in place of the api key points at the key in Secrets Manager
    if config.api_key_is_secret_arn() {
        let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let secrets = aws_sdk_secretsmanager::Client::new(&aws_config);
        config.resolve_api_key(&secrets).await?;
    }

    let client = AmplitudeClient::new(&config)?;
    info!("Forwarding to {}", client.url());

    run(service_fn(|request: LambdaEvent<Webhook>| {
        branch_amplitude_bridge::handler(&client, &config, request)
    }))
    .await
}
