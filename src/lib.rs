//! # Passage (Central Authentication Server Core)
//!
//! `passage` issues, validates, chains and revokes the short-lived tickets that
//! represent a user's single sign-on session and every application access
//! granted from it.
//!
//! ## Tickets
//!
//! A **ticket-granting ticket** (`TGT-`) is minted once primary authentication
//! succeeds. Service tickets (`ST-`) are granted from it, one per application
//! access, and may in turn grant exactly one proxy-granting ticket (`PGT-`).
//! Proxy tickets (`PT-`) are granted from a `PGT`.
//!
//! - **Prefix dispatch:** the ticket kind is carried in the id prefix.
//! - **Descendant expiry:** a ticket is expired when it or anything up its
//!   granting chain is expired.
//! - **Cascading revocation:** destroying a `TGT` removes every descendant and
//!   yields one logout request per distinct service.
//!
//! ## Authentication
//!
//! Credentials run through pluggable handlers and principal resolvers under a
//! configurable policy (`any`, `all`, required handler, ...). The result is an
//! immutable [`authentication::Authentication`].
//!
//! ## Event resolution
//!
//! After primary authentication an ordered chain of resolvers decides whether
//! the target service requires an additional factor, consulting the
//! multifactor provider registry (availability, bypass, failure mode). The
//! ticket-granting ticket is only issued once every check has passed.

pub mod api;
pub mod authentication;
pub mod cas;
pub mod cipher;
pub mod cli;
pub mod config;
pub mod error;
pub mod logout;
pub mod mfa;
pub mod services;
pub mod ticket;
pub mod webflow;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
