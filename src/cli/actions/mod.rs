pub mod server;

use std::time::Duration;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        /// `user::password` pairs, comma separated.
        accept_users: String,
        service_patterns: Vec<String>,
        cleaner_interval: Option<Duration>,
        /// Principal attributes naming a required multifactor provider.
        mfa_principal_attributes: Vec<String>,
        node_suffix: Option<String>,
    },
}
