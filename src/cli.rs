use std::path::PathBuf;

use clap_derive::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config with broker and store connection details. Keep it chmod 600.
    #[arg(long, default_value = "private_config.json")]
    pub config_private: PathBuf,
    /// JSON config with the topic to subscribe to
    #[arg(long, default_value = "public_config.json")]
    pub config_public: PathBuf,
    /// Log filter, ex. `debug` or `daq_ingest=trace`. Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["daq-ingest"]).unwrap();
        assert_eq!(cli.config_private, PathBuf::from("private_config.json"));
        assert_eq!(cli.config_public, PathBuf::from("public_config.json"));
        assert_eq!(cli.log_level, None);
    }

    #[test]
    fn overrides() {
        let cli = Cli::try_parse_from([
            "daq-ingest",
            "--config-private",
            "/etc/daq/private.json",
            "--config-public",
            "pub.json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config_private, PathBuf::from("/etc/daq/private.json"));
        assert_eq!(cli.config_public, PathBuf::from("pub.json"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn unknown_flag() {
        assert!(Cli::try_parse_from(["daq-ingest", "--topics", "a"]).is_err());
    }
}
