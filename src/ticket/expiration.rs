use crate::authentication::Authentication;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read-only view of the usage state an expiration policy inspects.
pub trait TicketState {
    fn creation_time(&self) -> DateTime<Utc>;

    fn last_time_used(&self) -> DateTime<Utc>;

    fn count_of_uses(&self) -> u32;

    /// Authentication behind the ticket, when the ticket carries one.
    fn authentication(&self) -> Option<&Authentication>;
}

/// Decides when a ticket stops being usable.
///
/// A missing ticket is always expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ExpirationPolicy {
    NeverExpires,
    /// Sliding window since the last use. A negative window means already
    /// expired.
    Timeout { time_to_kill_seconds: i64 },
    /// Fixed window since creation.
    HardTimeout { time_to_kill_seconds: i64 },
    /// Expired after `number_of_uses` uses or when idle for the window.
    MultiTimeUseOrTimeout {
        number_of_uses: u32,
        time_to_kill_millis: i64,
    },
    /// Session policy: a hard cap since creation plus an idle window.
    TicketGrantingTicket {
        max_time_to_live_seconds: i64,
        time_to_kill_seconds: i64,
    },
    /// Picks one of two policies by the authentication's remember-me flag.
    RememberMeDelegating {
        session: Box<ExpirationPolicy>,
        remember_me: Box<ExpirationPolicy>,
    },
}

fn window_elapsed(start: DateTime<Utc>, window: Option<TimeDelta>, now: DateTime<Utc>) -> bool {
    window
        .and_then(|window| start.checked_add_signed(window))
        .is_some_and(|deadline| deadline < now)
}

impl ExpirationPolicy {
    #[must_use]
    pub fn timeout(seconds: i64) -> Self {
        Self::Timeout {
            time_to_kill_seconds: seconds,
        }
    }

    #[must_use]
    pub fn hard_timeout(seconds: i64) -> Self {
        Self::HardTimeout {
            time_to_kill_seconds: seconds,
        }
    }

    #[must_use]
    pub fn multi_time_use_or_timeout(number_of_uses: u32, time_to_kill_millis: i64) -> Self {
        Self::MultiTimeUseOrTimeout {
            number_of_uses,
            time_to_kill_millis,
        }
    }

    #[must_use]
    pub fn ticket_granting_ticket(
        max_time_to_live_seconds: i64,
        time_to_kill_seconds: i64,
    ) -> Self {
        Self::TicketGrantingTicket {
            max_time_to_live_seconds,
            time_to_kill_seconds,
        }
    }

    /// `session` applies normally, `remember_me` when the authentication
    /// asked to be remembered.
    #[must_use]
    pub fn remember_me_delegating(session: Self, remember_me: Self) -> Self {
        Self::RememberMeDelegating {
            session: Box::new(session),
            remember_me: Box::new(remember_me),
        }
    }

    #[must_use]
    pub fn is_expired(&self, ticket: Option<&dyn TicketState>) -> bool {
        let Some(ticket) = ticket else {
            return true;
        };
        let now = Utc::now();

        match self {
            Self::NeverExpires => false,
            Self::Timeout {
                time_to_kill_seconds,
            } => window_elapsed(
                ticket.last_time_used(),
                TimeDelta::try_seconds(*time_to_kill_seconds),
                now,
            ),
            Self::HardTimeout {
                time_to_kill_seconds,
            } => window_elapsed(
                ticket.creation_time(),
                TimeDelta::try_seconds(*time_to_kill_seconds),
                now,
            ),
            Self::MultiTimeUseOrTimeout {
                number_of_uses,
                time_to_kill_millis,
            } => {
                ticket.count_of_uses() >= *number_of_uses
                    || window_elapsed(
                        ticket.last_time_used(),
                        TimeDelta::try_milliseconds(*time_to_kill_millis),
                        now,
                    )
            }
            Self::TicketGrantingTicket {
                max_time_to_live_seconds,
                time_to_kill_seconds,
            } => {
                window_elapsed(
                    ticket.creation_time(),
                    TimeDelta::try_seconds(*max_time_to_live_seconds),
                    now,
                ) || window_elapsed(
                    ticket.last_time_used(),
                    TimeDelta::try_seconds(*time_to_kill_seconds),
                    now,
                )
            }
            Self::RememberMeDelegating {
                remember_me,
                session,
            } => {
                let remembered = ticket
                    .authentication()
                    .is_some_and(Authentication::is_remember_me);
                if remembered {
                    remember_me.is_expired(Some(ticket))
                } else {
                    session.is_expired(Some(ticket))
                }
            }
        }
    }

    /// Upper bound on a ticket's lifetime, used as the storage TTL.
    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> {
        let seconds = |value: i64| Duration::from_secs(u64::try_from(value).unwrap_or(0));
        match self {
            Self::NeverExpires => None,
            Self::Timeout {
                time_to_kill_seconds,
            }
            | Self::HardTimeout {
                time_to_kill_seconds,
            } => Some(seconds(*time_to_kill_seconds)),
            Self::MultiTimeUseOrTimeout {
                time_to_kill_millis,
                ..
            } => Some(Duration::from_millis(
                u64::try_from(*time_to_kill_millis).unwrap_or(0),
            )),
            Self::TicketGrantingTicket {
                max_time_to_live_seconds,
                ..
            } => Some(seconds(*max_time_to_live_seconds)),
            Self::RememberMeDelegating {
                remember_me,
                session,
            } => match (remember_me.time_to_live(), session.time_to_live()) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
        }
    }

    /// How long a ticket may sit unused.
    #[must_use]
    pub fn time_to_idle(&self) -> Option<Duration> {
        match self {
            Self::TicketGrantingTicket {
                time_to_kill_seconds,
                ..
            } => Some(Duration::from_secs(
                u64::try_from(*time_to_kill_seconds).unwrap_or(0),
            )),
            Self::RememberMeDelegating { session, .. } => session.time_to_idle(),
            _ => self.time_to_live(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::{AuthenticationBuilder, Principal, REMEMBER_ME_ATTRIBUTE};

    struct State {
        created: DateTime<Utc>,
        used: DateTime<Utc>,
        uses: u32,
        authentication: Option<Authentication>,
    }

    impl State {
        fn fresh() -> Self {
            let now = Utc::now();
            Self {
                created: now,
                used: now,
                uses: 0,
                authentication: None,
            }
        }

        fn aged(seconds: i64) -> Self {
            let past = Utc::now() - TimeDelta::seconds(seconds);
            Self {
                created: past,
                used: past,
                uses: 0,
                authentication: None,
            }
        }
    }

    impl TicketState for State {
        fn creation_time(&self) -> DateTime<Utc> {
            self.created
        }

        fn last_time_used(&self) -> DateTime<Utc> {
            self.used
        }

        fn count_of_uses(&self) -> u32 {
            self.uses
        }

        fn authentication(&self) -> Option<&Authentication> {
            self.authentication.as_ref()
        }
    }

    #[test]
    fn missing_ticket_is_expired() {
        for policy in [
            ExpirationPolicy::NeverExpires,
            ExpirationPolicy::timeout(3600),
            ExpirationPolicy::multi_time_use_or_timeout(5, 60_000),
        ] {
            assert!(policy.is_expired(None), "{policy:?}");
        }
    }

    #[test]
    fn negative_timeout_is_already_expired() {
        assert!(ExpirationPolicy::timeout(-100).is_expired(Some(&State::fresh())));
        assert!(!ExpirationPolicy::timeout(100).is_expired(Some(&State::fresh())));
    }

    #[test]
    fn timeout_slides_with_use_but_hard_timeout_does_not() {
        let mut state = State::aged(120);
        state.used = Utc::now();
        assert!(!ExpirationPolicy::timeout(60).is_expired(Some(&state)));
        assert!(ExpirationPolicy::hard_timeout(60).is_expired(Some(&state)));
    }

    #[test]
    fn multi_time_use_counts_uses() {
        let policy = ExpirationPolicy::multi_time_use_or_timeout(2, 60_000);
        let mut state = State::fresh();
        assert!(!policy.is_expired(Some(&state)));
        state.uses = 2;
        assert!(policy.is_expired(Some(&state)));
        assert!(policy.is_expired(Some(&State::aged(61))));
    }

    #[test]
    fn ticket_granting_policy_applies_both_windows() {
        let policy = ExpirationPolicy::ticket_granting_ticket(3600, 60);
        assert!(!policy.is_expired(Some(&State::fresh())));
        assert!(policy.is_expired(Some(&State::aged(120))));

        let mut state = State::aged(7200);
        state.used = Utc::now();
        assert!(policy.is_expired(Some(&state)));
    }

    #[test]
    fn remember_me_uses_the_second_policy() {
        let policy = ExpirationPolicy::remember_me_delegating(
            ExpirationPolicy::multi_time_use_or_timeout(5, 20_000),
            ExpirationPolicy::multi_time_use_or_timeout(1, 20_000),
        );

        let mut builder = AuthenticationBuilder::new();
        builder
            .set_principal(Principal::new("casuser"))
            .add_attribute(REMEMBER_ME_ATTRIBUTE, vec!["true".to_string()]);

        let mut remembered = State::fresh();
        remembered.uses = 1;
        remembered.authentication = Some(builder.build());
        assert!(policy.is_expired(Some(&remembered)));

        let mut session = State::fresh();
        session.uses = 1;
        assert!(!policy.is_expired(Some(&session)));
    }

    #[test]
    fn storage_windows() {
        assert_eq!(ExpirationPolicy::NeverExpires.time_to_live(), None);
        assert_eq!(
            ExpirationPolicy::ticket_granting_ticket(28_800, 7_200).time_to_live(),
            Some(Duration::from_secs(28_800))
        );
        assert_eq!(
            ExpirationPolicy::ticket_granting_ticket(28_800, 7_200).time_to_idle(),
            Some(Duration::from_secs(7_200))
        );
        assert_eq!(
            ExpirationPolicy::multi_time_use_or_timeout(1, 10_000).time_to_live(),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn policies_serialize_with_a_tag() {
        let json = serde_json::to_value(ExpirationPolicy::timeout(30)).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"policy": "timeout", "time_to_kill_seconds": 30})
        );
    }
}
