//! Command-line interface argument parsing.

use clap::{Parser, Subcommand};

/// Call-recordings dashboard for GoHighLevel.
///
/// Aggregates contacts, conversations and call recordings from the CRM and serves them as JSON,
/// or browses them interactively in the terminal.
///
/// Examples:
///   ghl-recordings
///   ghl-recordings serve --bind 127.0.0.1:8080
///   ghl-recordings dashboard --location u05ZSlGlNMllG61fIuW8
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Listen address; overrides GHL_BIND_ADDR
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Browse contacts and recordings in the terminal
    Dashboard {
        /// Location to browse; defaults to GHL_DEFAULT_LOCATION_ID
        #[arg(long, value_name = "ID", env = "GHL_LOCATION_ID")]
        location: Option<String>,

        /// Address the dashboard serves recording links on; overrides GHL_BIND_ADDR
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

impl Args {
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Serve { bind: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = Args::try_parse_from(["ghl-recordings"]).unwrap();
        assert!(matches!(args.command_or_default(), Command::Serve { bind: None }));
    }

    #[test]
    fn test_serve_bind_override() {
        let args = Args::try_parse_from(["ghl-recordings", "serve", "--bind", "127.0.0.1:8080"])
            .unwrap();
        match args.command_or_default() {
            Command::Serve { bind } => assert_eq!(bind.as_deref(), Some("127.0.0.1:8080")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dashboard_location() {
        let args =
            Args::try_parse_from(["ghl-recordings", "dashboard", "--location", "loc1"]).unwrap();
        assert!(matches!(
            args.command_or_default(),
            Command::Dashboard { location: Some(l), bind: None } if l == "loc1"
        ));
    }

    #[test]
    fn test_dashboard_bind() {
        let args = Args::try_parse_from([
            "ghl-recordings",
            "dashboard",
            "--bind",
            "127.0.0.1:0",
        ])
        .unwrap();
        assert!(matches!(
            args.command_or_default(),
            Command::Dashboard { bind: Some(b), .. } if b == "127.0.0.1:0"
        ));
    }
}
