use tracing::Level;

/// Installs a fmt subscriber on stderr. Stdout is reserved for program
/// output and, in the tool server, the JSON-RPC stream.
pub fn init_tracing(level: Level) {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
