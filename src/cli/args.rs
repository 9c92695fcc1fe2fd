use clap::Parser;

/// Serve the transformed chart of accounts over HTTP
#[derive(Parser, Debug)]
#[command(name = "coa-api")]
#[command(about = "Chart-of-accounts API with a write-through durable cache", long_about = None)]
pub struct CliArgs {
    /// Bind address for the HTTP server
    #[arg(
        long = "bind",
        value_name = "ADDR",
        help = "Bind address, e.g. 0.0.0.0:3000 (overrides COA_BIND)"
    )]
    pub bind: Option<String>,

    /// Directory for the filesystem durable cache
    #[arg(
        long = "cache-dir",
        value_name = "DIR",
        help = "Durable cache directory (overrides COA_CACHE_DIR)"
    )]
    pub cache_dir: Option<String>,

    /// Log filter directive
    #[arg(
        long = "log",
        value_name = "FILTER",
        default_value = "info",
        help = "Tracing filter, e.g. 'debug' or 'coa_api=debug,tower_http=info'"
    )]
    pub log: String,
}

/// Parse command-line arguments
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::defaults(&["coa-api"], None, None, "info")]
    #[case::bind(&["coa-api", "--bind", "127.0.0.1:8080"], Some("127.0.0.1:8080"), None, "info")]
    #[case::cache_dir(&["coa-api", "--cache-dir", "/var/cache/coa"], None, Some("/var/cache/coa"), "info")]
    #[case::log(&["coa-api", "--log", "debug"], None, None, "debug")]
    fn test_arg_parsing(
        #[case] args: &[&str],
        #[case] bind: Option<&str>,
        #[case] cache_dir: Option<&str>,
        #[case] log: &str,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.bind.as_deref(), bind);
        assert_eq!(parsed.cache_dir.as_deref(), cache_dir);
        assert_eq!(parsed.log, log);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(CliArgs::try_parse_from(["coa-api", "--strategy", "sync"]).is_err());
    }
}
