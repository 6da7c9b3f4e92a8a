use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{anyhow, Result};
use secrecy::SecretString;
use std::time::Duration;

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let mut globals = GlobalArgs::new();
    if let Some(key) = matches.get_one::<String>("ticket-encryption-key") {
        globals.set_ticket_encryption_key(SecretString::from(key.clone()));
    }

    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        accept_users: matches
            .get_one::<String>("accept-users")
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --accept-users"))?,
        service_patterns: matches
            .get_many::<String>("service-pattern")
            .map(|patterns| patterns.cloned().collect())
            .unwrap_or_default(),
        cleaner_interval: matches
            .get_one::<u64>("cleaner-interval")
            .copied()
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs),
        mfa_principal_attributes: matches
            .get_many::<String>("mfa-principal-attribute")
            .map(|names| names.cloned().collect())
            .unwrap_or_default(),
        node_suffix: matches.get_one::<String>("node-suffix").cloned(),
    };

    Ok((action, globals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler() -> Result<()> {
        temp_env::with_vars(
            [
                ("PASSAGE_PORT", None::<&str>),
                ("PASSAGE_SERVICE_PATTERN", None),
                ("PASSAGE_CLEANER_INTERVAL", None),
                ("PASSAGE_NODE_SUFFIX", None),
                ("PASSAGE_MFA_PRINCIPAL_ATTRIBUTE", None),
            ],
            || -> Result<()> {
                let matches = commands::new().get_matches_from(vec![
                    "passage",
                    "--accept-users",
                    "casuser::Mellon",
                    "--ticket-encryption-key",
                    "a2V5",
                ]);
                let (action, globals) = handler(&matches)?;
                let Action::Server {
                    port,
                    accept_users,
                    service_patterns,
                    cleaner_interval,
                    mfa_principal_attributes,
                    node_suffix,
                } = action;
                assert_eq!(port, 8080);
                assert_eq!(accept_users, "casuser::Mellon");
                assert_eq!(service_patterns, vec!["^https://.*".to_string()]);
                assert_eq!(cleaner_interval, Some(Duration::from_secs(120)));
                assert!(mfa_principal_attributes.is_empty());
                assert!(node_suffix.is_none());
                assert_eq!(
                    globals
                        .ticket_encryption_key
                        .as_ref()
                        .map(|key| key.expose_secret().to_string()),
                    Some("a2V5".to_string())
                );
                Ok(())
            },
        )
    }

    #[test]
    fn test_zero_interval_disables_cleaner() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "passage",
            "--accept-users",
            "casuser::Mellon",
            "--cleaner-interval",
            "0",
        ]);
        let (Action::Server {
            cleaner_interval, ..
        }, _) = handler(&matches)?;
        assert!(cleaner_interval.is_none());
        Ok(())
    }

    #[test]
    fn test_mfa_principal_attributes() -> Result<()> {
        temp_env::with_vars(
            [("PASSAGE_MFA_PRINCIPAL_ATTRIBUTE", Some("mfaRequired,memberOf"))],
            || -> Result<()> {
                let matches = commands::new().get_matches_from(vec![
                    "passage",
                    "--accept-users",
                    "casuser::Mellon",
                ]);
                let (Action::Server {
                    mfa_principal_attributes,
                    ..
                }, _) = handler(&matches)?;
                assert_eq!(mfa_principal_attributes, vec!["mfaRequired", "memberOf"]);
                Ok(())
            },
        )
    }
}
