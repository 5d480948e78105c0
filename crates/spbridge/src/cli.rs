use clap::error::ErrorKind;
use clap::{Arg, ArgAction, Command};
use spbridge_core::{ensure_prompt, ChatRequest, DispatcherConfig};
use tracing::Level;

const SERVER_ARGS_FLAG: &str = "--server-args";

pub fn build_chat_command() -> Command {
    Command::new("sharepoint-chat")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Send a prompt to OpenAI with the SharePoint MCP server attached")
        .arg(
            Arg::new("prompt")
                .value_name("PROMPT")
                .num_args(0..)
                .help("Prompt words; a default request is sent when omitted"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_name("MODEL")
                .help("OpenAI model (defaults to OPENAI_MODEL or gpt-4.1-mini)"),
        )
        .arg(
            Arg::new("temperature")
                .long("temperature")
                .value_name("T")
                .value_parser(parse_temperature)
                .help("Sampling temperature between 0 and 2"),
        )
        .arg(
            Arg::new("server-command")
                .long("server-command")
                .value_name("COMMAND")
                .help("Executable the model host launches as the MCP server"),
        )
        .arg(
            Arg::new("server-args")
                .long("server-args")
                .value_name("ARGS")
                .num_args(0..)
                .allow_hyphen_values(true)
                .help("Arguments for the MCP server; takes every remaining word"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
}

pub fn build_server_command() -> Command {
    Command::new("sharepoint-mcp")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serve SharePoint document library tools over MCP stdio")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
}

/// Rejects a configuration without an OpenAI key as a usage error, so the
/// dispatcher exits before any network call.
pub fn require_api_key(config: &DispatcherConfig) -> Result<(), clap::Error> {
    config
        .openai
        .require_api_key()
        .map(|_| ())
        .map_err(|err| build_chat_command().error(ErrorKind::MissingRequiredArgument, err))
}

fn parse_temperature(value: &str) -> Result<f64, String> {
    let temperature: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (0.0..=2.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(format!("{} is outside 0..=2", temperature))
    }
}

/// Splits argv at the first `--server-args`: everything after it belongs to
/// the server verbatim, even words that look like flags. A bare `--` ends the
/// search.
pub fn split_server_args(args: Vec<String>) -> (Vec<String>, Option<Vec<String>>) {
    let position = args
        .iter()
        .skip(1)
        .take_while(|arg| arg.as_str() != "--")
        .position(|arg| arg == SERVER_ARGS_FLAG || arg.starts_with("--server-args="))
        .map(|i| i + 1);

    let Some(index) = position else {
        return (args, None);
    };

    let mut head = args;
    let mut tail = head.split_off(index);
    let flag = tail.remove(0);
    if let Some(inline) = flag.strip_prefix("--server-args=") {
        tail.insert(0, inline.to_string());
    }
    (head, Some(tail))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatArgs {
    pub prompt: Vec<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub server_command: Option<String>,
    pub server_args: Option<Vec<String>>,
    pub verbose: u8,
}

impl ChatArgs {
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let (head, server_args) = split_server_args(args.into_iter().map(Into::into).collect());
        let matches = build_chat_command().try_get_matches_from(head)?;

        Ok(Self {
            prompt: matches
                .get_many::<String>("prompt")
                .map(|words| words.cloned().collect())
                .unwrap_or_default(),
            model: matches.get_one::<String>("model").cloned(),
            temperature: matches.get_one::<f64>("temperature").copied(),
            server_command: matches.get_one::<String>("server-command").cloned(),
            server_args,
            verbose: matches.get_count("verbose"),
        })
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    /// Fills anything not given on the command line from `config`.
    pub fn into_request(self, config: &DispatcherConfig) -> ChatRequest {
        ChatRequest {
            prompt: ensure_prompt(&self.prompt),
            model: self.model.unwrap_or_else(|| config.openai.model.clone()),
            temperature: self.temperature.unwrap_or(config.openai.temperature),
            server_command: self
                .server_command
                .unwrap_or_else(|| config.mcp_server.command.clone()),
            server_args: self
                .server_args
                .unwrap_or_else(|| config.mcp_server.args_list()),
        }
    }
}
