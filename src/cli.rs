use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::AuthCommand;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "authing-aws",
    version,
    about = "Fetch temporary AWS credentials through an Authing SSO portal",
    long_about = None
)]
pub struct Cli {
    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Sign in through the portal and print credential export lines")]
    Auth(AuthCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Auth(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, error::ErrorKind};

    fn auth_args() -> Vec<&'static str> {
        vec![
            "authing-aws",
            "auth",
            "--url",
            "https://example.authing.cn",
            "--username",
            "alice",
            "--password",
            "secret",
            "--app",
            "Prod",
        ]
    }

    #[test]
    fn test_auth_command_parsing() {
        let cli = Cli::try_parse_from(auth_args()).unwrap();
        let Commands::Auth(cmd) = cli.command;
        assert_eq!(cmd.url, "https://example.authing.cn");
        assert_eq!(cmd.username, "alice");
        assert_eq!(cmd.app, "Prod");
        assert!(!cmd.debug);
        assert!(!cmd.disable_headless);
        assert_eq!(cmd.profile_dir, None);
    }

    #[test]
    fn test_auth_defaults() {
        let cli = Cli::try_parse_from(auth_args()).unwrap();
        let Commands::Auth(cmd) = cli.command;
        assert_eq!(cmd.duration, crate::constants::DEFAULT_SESSION_DURATION_SECS);
        assert_eq!(cmd.region, crate::constants::DEFAULT_REGION);
    }

    #[test]
    fn test_auth_flags() {
        let mut args = auth_args();
        args.extend(["--debug", "--disable-headless", "--region", "us-east-1"]);
        let cli = Cli::try_parse_from(args).unwrap();
        let Commands::Auth(cmd) = cli.command;
        assert!(cmd.debug);
        assert!(cmd.disable_headless);
        assert_eq!(cmd.region, "us-east-1");
    }

    #[test]
    fn test_missing_required_args_fails() {
        let result = Cli::try_parse_from(["authing-aws", "auth"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbose_flag_multiple() {
        let mut args = auth_args();
        args.insert(1, "-vvv");
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn test_command_structure_validation() {
        let cmd = Cli::command();
        cmd.debug_assert();
    }

    #[test]
    fn test_help_flag_works() {
        let result = Cli::try_parse_from(["authing-aws", "--help"]);
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::DisplayHelp);
        }
    }
}
