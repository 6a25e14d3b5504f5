//! CLI entry point for hik-logdump — dump raw Hikvision ISAPI logs for a
//! time window.
//!
//! The password is never taken from the command line. It is read from the
//! `HIK_LOGDUMP_PASSWORD` environment variable when set, otherwise prompted
//! for on the terminal without echo.
//!
//! Without `-o`, the raw XML goes to stdout and all diagnostics to stderr.
//!
//! Exit codes:
//! - 0: success
//! - 2: argument or timestamp validation error (clap also uses 2)
//! - 3: authentication failed
//! - 4: connection failure or timeout
//! - 5: unexpected HTTP status or empty response
//! - 6: I/O error (password prompt or output write)

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use hik_logdump::auth::Credentials;
use hik_logdump::client::IsapiClient;
use hik_logdump::config::{DEFAULT_MAX_RESULTS, DEFAULT_REQUEST_TIMEOUT_SECS, FetchConfig, Scheme};
use hik_logdump::error::{FetchError, Result};
use hik_logdump::logging;
use hik_logdump::output::OutputTarget;
use hik_logdump::search::run_log_search;
use hik_logdump::timespan::TimeSpan;

/// Environment variable consulted before prompting for the password.
const PASSWORD_ENV: &str = "HIK_LOGDUMP_PASSWORD";

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Device IP address or hostname, optionally with `:port`. IPv6
    /// literals need brackets.
    host: String,

    /// Digest username. The password is prompted for.
    user: String,

    /// Start of the window: YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS].
    start: String,

    /// End of the window, inclusive. A bare date means the end of that day.
    end: String,

    /// Output file. Raw XML goes to standard output when omitted.
    #[arg(short, long, visible_alias = "out")]
    output: Option<PathBuf>,

    /// Rows per result page (`maxResults`). Only the first page is fetched,
    /// so raise this for busy windows.
    #[arg(
        long,
        env = "HIK_LOGDUMP_BATCH",
        default_value_t = DEFAULT_MAX_RESULTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    batch: u32,

    /// Overall request timeout in seconds.
    #[arg(
        long,
        env = "HIK_LOGDUMP_TIMEOUT",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Use plain HTTP instead of HTTPS.
    #[arg(long)]
    http: bool,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            request_timeout: Duration::from_secs(self.timeout),
            max_results: self.batch,
            scheme: if self.http { Scheme::Http } else { Scheme::Https },
            ..FetchConfig::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: could not initialize logging: {e}");
    }

    ExitCode::from(exit_status(&run(cli).await))
}

/// Reports a failure on stderr and picks the process exit status.
fn exit_status(outcome: &Result<()>) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error ({}): {e}", e.stage());
            e.exit_code()
        }
    }
}

/// Validates arguments, then performs the single fetch-and-write.
///
/// Everything that can be checked locally (timestamps, host) is checked
/// before the password prompt.
async fn run(cli: Cli) -> Result<()> {
    let span = TimeSpan::parse(&cli.start, &cli.end)?;
    let config = cli.fetch_config();
    let client = IsapiClient::new(&cli.host, &config)?;
    let output = OutputTarget::from_arg(cli.output.clone());
    debug!(window = %span, destination = %output, "arguments validated");

    let password = read_password(&cli.user, &cli.host)?;
    let credentials = Credentials::new(cli.user.as_str(), password);

    let written = run_log_search(&client, &credentials, &span, &config, &output).await?;
    if let OutputTarget::File(path) = &output {
        eprintln!("Wrote {written} bytes of raw log XML to {}", path.display());
    }
    Ok(())
}

fn read_password(user: &str, host: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        debug!("using password from {PASSWORD_ENV}");
        return Ok(password);
    }
    rpassword::prompt_password(format!("Password for {user}@{host}: ")).map_err(|source| {
        FetchError::Io {
            target: "terminal".to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec!["hik-logdump", "10.10.10.10", "admin", "2025-05-01", "2025-05-08"]
    }

    #[test]
    fn positional_arguments_parse() {
        let cli = Cli::try_parse_from(base_args()).expect("should parse the four positionals");
        assert_eq!(cli.host, "10.10.10.10");
        assert_eq!(cli.user, "admin");
        assert_eq!(cli.start, "2025-05-01");
        assert_eq!(cli.end, "2025-05-08");
        assert!(cli.output.is_none(), "default output is stdout");
        assert_eq!(cli.verbose, 0);
        assert!(!cli.http);
    }

    #[test]
    fn missing_end_is_rejected() {
        let mut args = base_args();
        args.pop();
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn output_short_long_and_alias() {
        for flag in ["-o", "--output", "--out"] {
            let mut args = base_args();
            args.extend_from_slice(&[flag, "out.xml"]);
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(
                cli.output.as_deref(),
                Some(std::path::Path::new("out.xml")),
                "{flag} should set the output path"
            );
        }
    }

    #[test]
    fn password_flag_does_not_exist() {
        let mut args = base_args();
        args.extend_from_slice(&["--password", "hunter2"]);
        assert!(
            Cli::try_parse_from(args).is_err(),
            "passwords must not be accepted on the command line"
        );
    }

    #[test]
    fn zero_batch_is_rejected() {
        let mut args = base_args();
        args.extend_from_slice(&["--batch", "0"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn flags_map_onto_fetch_config() {
        let mut args = base_args();
        args.extend_from_slice(&["--batch", "512", "--timeout", "30", "--http", "-vv"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);

        let config = cli.fetch_config();
        assert_eq!(config.max_results, 512);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.scheme, Scheme::Http);
        assert_eq!(
            config.connect_timeout,
            FetchConfig::default().connect_timeout,
            "unset fields keep their defaults"
        );
    }

    #[tokio::test]
    async fn week_window_is_dumped_to_the_output_file() {
        use wiremock::matchers::{header_exists, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const PAYLOAD: &[u8] =
            b"<CMSearchResult><responseStatusStrg>OK</responseStatusStrg></CMSearchResult>";

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(hik_logdump::search::LOG_SEARCH_PATH))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(hik_logdump::search::LOG_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(401).insert_header(
                "WWW-Authenticate",
                r#"Digest realm="nvr", nonce="abc", qop="auth""#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.xml");
        let host = server.address().to_string();
        let cli = Cli::try_parse_from([
            "hik-logdump",
            host.as_str(),
            "admin",
            "2025-05-01",
            "2025-05-08",
            "-o",
            out.to_str().unwrap(),
            "--http",
        ])
        .unwrap();

        // SAFETY: every other environment access in this binary goes through
        // std (clap's `env` lookups), which serialises it with this write.
        unsafe { std::env::set_var(PASSWORD_ENV, "Hik12345") };
        let outcome = run(cli).await;

        assert!(outcome.is_ok(), "got {outcome:?}");
        assert_eq!(exit_status(&outcome), 0);
        assert_eq!(std::fs::read(&out).unwrap(), PAYLOAD);

        let requests = server.received_requests().await.unwrap();
        let authorization = requests[1]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(authorization.starts_with(r#"Digest username="admin""#));
        assert!(!authorization.contains("Hik12345"));
    }

    #[test]
    fn failures_map_to_their_exit_codes() {
        let err = FetchError::Auth {
            message: "device rejected credentials".to_string(),
        };
        assert_eq!(exit_status(&Err(err)), 3);
    }

    #[test]
    fn inverted_window_fails_before_any_request() {
        let mut args = base_args();
        args[3] = "2025-05-08";
        args[4] = "2025-05-01";
        let cli = Cli::try_parse_from(args).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt.block_on(run(cli)).unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)), "got {err:?}");
        assert_eq!(err.exit_code(), 2);
    }
}
