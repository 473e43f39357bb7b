use chrono::{DateTime, TimeDelta, Utc};

pub type AccessToken = String;

/// A bearer token stays usable for one hour after it was acquired.
pub const FRESHNESS_WINDOW: TimeDelta = TimeDelta::seconds(3600);

/// A bearer token together with the instant it was obtained.
///
/// Credentials are never mutated: a refresh produces a new value that replaces the old one.
#[derive(Clone, Debug, PartialEq)]
pub struct Credential {
    access_token: AccessToken,
    acquired_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(access_token: AccessToken, acquired_at: DateTime<Utc>) -> Self {
        Credential {
            access_token,
            acquired_at,
        }
    }

    /// A credential obtained right now.
    pub fn acquired_now(access_token: AccessToken) -> Self {
        Self::new(access_token, Utc::now())
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Elapsed time since acquisition. An acquisition instant in the future counts as zero.
    pub fn age(&self) -> TimeDelta {
        self.age_at(Utc::now())
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub(crate) fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.acquired_at).max(TimeDelta::zero())
    }

    pub(crate) fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.age_at(now) < FRESHNESS_WINDOW
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::just_acquired(0, true)]
    #[case::one_second_before_window(3599, true)]
    #[case::at_window(3600, false)]
    #[case::past_window(7200, false)]
    fn freshness_boundary(#[case] age_secs: i64, #[case] fresh: bool) {
        let now = Utc::now();
        let credential = Credential::new(
            AccessToken::from("some-token"),
            now - TimeDelta::seconds(age_secs),
        );
        assert_eq!(credential.is_fresh_at(now), fresh);
    }

    #[test]
    fn future_acquisition_counts_as_zero_age() {
        let now = Utc::now();
        let credential = Credential::new(
            AccessToken::from("some-token"),
            now + TimeDelta::seconds(30),
        );
        assert_eq!(credential.age_at(now), TimeDelta::zero());
        assert!(credential.is_fresh_at(now));
    }

    #[test]
    fn empty_token_is_never_fresh() {
        let credential = Credential::acquired_now(AccessToken::new());
        assert!(!credential.is_fresh());
    }
}
