use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("passage")
        .about("Central authentication and single sign-on")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PASSAGE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("accept-users")
                .long("accept-users")
                .help("Accepted credentials, example: casuser::Mellon,admin::secret")
                .env("PASSAGE_ACCEPT_USERS")
                .required(true),
        )
        .arg(
            Arg::new("service-pattern")
                .long("service-pattern")
                .help("Regular expression of a service allowed to use the server, may be repeated")
                .env("PASSAGE_SERVICE_PATTERN")
                .value_delimiter(',')
                .action(clap::ArgAction::Append)
                .default_value("^https://.*"),
        )
        .arg(
            Arg::new("ticket-encryption-key")
                .long("ticket-encryption-key")
                .help("Base64 encoded 32 byte key to encrypt stored tickets (clear when unset)")
                .env("PASSAGE_TICKET_ENCRYPTION_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("cleaner-interval")
                .long("cleaner-interval")
                .help("Seconds between expired ticket sweeps, 0 disables the cleaner")
                .default_value("120")
                .env("PASSAGE_CLEANER_INTERVAL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("mfa-principal-attribute")
                .long("mfa-principal-attribute")
                .help("Principal attribute whose values name a required multifactor provider")
                .env("PASSAGE_MFA_PRINCIPAL_ATTRIBUTE")
                .value_delimiter(',')
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("node-suffix")
                .long("node-suffix")
                .help("Suffix appended to ticket ids to identify this node")
                .env("PASSAGE_NODE_SUFFIX"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PASSAGE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "passage");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Central authentication and single sign-on"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_args() {
        temp_env::with_vars(
            [
                ("PASSAGE_SERVICE_PATTERN", None::<&str>),
                ("PASSAGE_CLEANER_INTERVAL", None),
                ("PASSAGE_MFA_PRINCIPAL_ATTRIBUTE", None),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "passage",
                    "--port",
                    "8443",
                    "--accept-users",
                    "casuser::Mellon",
                    "--service-pattern",
                    "^https://app\\.example\\.org/.*",
                    "--service-pattern",
                    "^https://wiki\\.example\\.org/.*",
                    "--node-suffix",
                    "node1",
                    "--mfa-principal-attribute",
                    "mfaRequired",
                ]);

                assert_eq!(matches.get_one::<u16>("port").copied(), Some(8443));
                assert_eq!(
                    matches.get_one::<String>("accept-users").map(String::as_str),
                    Some("casuser::Mellon")
                );
                let patterns: Vec<&String> = matches
                    .get_many::<String>("service-pattern")
                    .map(Iterator::collect)
                    .unwrap_or_default();
                assert_eq!(patterns.len(), 2);
                assert_eq!(matches.get_one::<u64>("cleaner-interval").copied(), Some(120));
                assert_eq!(
                    matches.get_one::<String>("node-suffix").map(String::as_str),
                    Some("node1")
                );
                assert!(matches.get_one::<String>("ticket-encryption-key").is_none());
                assert_eq!(
                    matches
                        .get_many::<String>("mfa-principal-attribute")
                        .map(Iterator::count),
                    Some(1)
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PASSAGE_PORT", Some("443")),
                ("PASSAGE_ACCEPT_USERS", Some("casuser::Mellon,admin::secret")),
                ("PASSAGE_SERVICE_PATTERN", Some("^https://a/.*,^https://b/.*")),
                ("PASSAGE_CLEANER_INTERVAL", Some("0")),
                ("PASSAGE_TICKET_ENCRYPTION_KEY", Some("a2V5")),
                ("PASSAGE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["passage"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("accept-users").map(String::as_str),
                    Some("casuser::Mellon,admin::secret")
                );
                assert_eq!(
                    matches
                        .get_many::<String>("service-pattern")
                        .map(Iterator::count),
                    Some(2)
                );
                assert_eq!(matches.get_one::<u64>("cleaner-interval").copied(), Some(0));
                assert_eq!(
                    matches
                        .get_one::<String>("ticket-encryption-key")
                        .map(String::as_str),
                    Some("a2V5")
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("PASSAGE_LOG_LEVEL", Some(level)),
                    ("PASSAGE_ACCEPT_USERS", Some("casuser::Mellon")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["passage"]);
                    assert_eq!(
                        matches.get_one::<u8>("verbosity").copied(),
                        Some(index as u8)
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5 {
            temp_env::with_vars([("PASSAGE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "passage".to_string(),
                    "--accept-users".to_string(),
                    "casuser::Mellon".to_string(),
                ];

                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }
}
