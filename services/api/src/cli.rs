use crate::commands::{print_agents, render_qr, replay, QrArgs, ReplayArgs};
use crate::server;
use broker_ai::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "broker-ai",
    about = "Run the WhatsApp real-estate broker and inspect its agents from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the stage to agent dispatch table
    Agents,
    /// Render a property inquiry QR code to a PNG file
    Qr(QrArgs),
    /// Run a webhook payload through an offline broker and print the replies
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Agents => {
            print_agents();
            Ok(())
        }
        Command::Qr(args) => render_qr(args).await,
        Command::Replay(args) => replay(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve() {
        let cli = Cli::try_parse_from(["broker-ai-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_qr_arguments() {
        let cli = Cli::try_parse_from([
            "broker-ai-api",
            "qr",
            "--address",
            "Calle 10 # 5-20",
            "--phone",
            "573001112233",
            "--output",
            "qr.png",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Qr(args)) => {
                assert_eq!(args.address, "Calle 10 # 5-20");
                assert_eq!(args.phone.as_deref(), Some("573001112233"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn replay_requires_payload() {
        assert!(Cli::try_parse_from(["broker-ai-api", "replay"]).is_err());
    }
}
