//! Command-line definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Run a live talk show with AI hosts.
#[derive(Debug, Parser)]
#[command(name = "onair")]
#[command(about = "Run a live multi-host radio show")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Go on air until Ctrl-C
    Run(RunArgs),
    /// Load and validate a show file without starting anything
    Check {
        /// Show settings (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Show settings (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Serve health, interrupts and the carrier stream on this address
    #[arg(long, env = "ONAIR_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Play the show through the default output device
    #[arg(long)]
    pub preview: bool,

    /// Print every show event to stdout as a JSON line
    #[arg(long)]
    pub events: bool,

    /// Fix the speaker-selection seed
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Encoder command fed with 24 kHz PCM16 on stdin. Consumes the rest of
    /// the command line, so pass it last.
    #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "CMD")]
    pub encoder: Vec<String>,
}

/// Overrides for the model endpoint. Unset flags keep the show file's values.
#[derive(Debug, Default, Args)]
pub struct ProviderArgs {
    /// OpenAI-compatible API root
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "ONAIR_CHAT_MODEL")]
    pub chat_model: Option<String>,

    #[arg(long, env = "ONAIR_SPEECH_MODEL")]
    pub speech_model: Option<String>,

    #[arg(long, env = "ONAIR_TRANSCRIPTION_MODEL")]
    pub transcription_model: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_takes_the_encoder_command_last() {
        let cli = Cli::parse_from([
            "onair",
            "-v",
            "run",
            "--config",
            "show.json",
            "--listen",
            "127.0.0.1:8080",
            "--encoder",
            "ffmpeg",
            "-f",
            "s16le",
            "-ar",
            "24000",
            "-i",
            "-",
        ]);
        assert!(cli.verbose);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("show.json"));
        assert_eq!(args.listen, Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(
            args.encoder,
            ["ffmpeg", "-f", "s16le", "-ar", "24000", "-i", "-"]
        );
        assert!(!args.preview);
    }

    #[test]
    fn check_needs_a_config() {
        assert!(Cli::try_parse_from(["onair", "check"]).is_err());
        let cli = Cli::parse_from(["onair", "check", "-c", "show.json"]);
        assert!(matches!(cli.command, Some(Commands::Check { .. })));
    }
}
