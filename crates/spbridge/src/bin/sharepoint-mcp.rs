use spbridge::cli::build_server_command;
use spbridge::logging::init_tracing;
use spbridge_tools::{sharepoint_registry, LazyLibrary, McpServer};
use std::sync::Arc;
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_server_command().get_matches();
    init_tracing(if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    });

    // SharePoint settings are read on the first tool call, not at startup.
    let library = Arc::new(LazyLibrary::from_env());
    let server = McpServer::new(
        "sharepoint",
        env!("CARGO_PKG_VERSION"),
        sharepoint_registry(library),
    );

    server.run_stdio().await?;
    tracing::info!("client disconnected");
    Ok(())
}
