use anyhow::Context;
use spbridge::cli::{require_api_key, ChatArgs};
use spbridge::logging::init_tracing;
use spbridge_core::DispatcherConfig;
use spbridge_providers::OpenAIProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ChatArgs::try_parse_from(std::env::args()).unwrap_or_else(|err| err.exit());
    init_tracing(args.log_level());

    let config = DispatcherConfig::load().context("failed to load configuration")?;
    require_api_key(&config).unwrap_or_else(|err| err.exit());

    let provider = OpenAIProvider::new(&config.openai)?;
    let request = args.into_request(&config);
    tracing::info!(
        model = %request.model,
        server = %request.server_command,
        "dispatching prompt"
    );

    let text = provider
        .respond(&request)
        .await
        .context("OpenAI request failed")?;
    println!("{}", text);
    Ok(())
}
