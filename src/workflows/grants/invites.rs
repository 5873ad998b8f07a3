use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use super::domain::{Client, Invite};

pub const INVITE_TOKEN_LENGTH: usize = 43;
pub const DEFAULT_INVITE_TTL_DAYS: i64 = 7;

/// Bearer token for an invitation link. Drawn from the thread-local CSPRNG.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub fn expiry_from(now: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
    now + Duration::days(ttl_days)
}

/// Issue a fresh token and expiry on an existing invite.
pub fn refresh(invite: &mut Invite, now: DateTime<Utc>, ttl_days: i64) {
    invite.token = generate_token();
    invite.expires_at = expiry_from(now, ttl_days);
}

/// Public answer to "is this invitation link still good?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteInfo {
    pub email: String,
    pub name: Option<String>,
    pub client_name: String,
    pub is_expired: bool,
    pub is_valid: bool,
}

impl InviteInfo {
    pub fn invalid() -> Self {
        Self {
            email: String::new(),
            name: None,
            client_name: String::new(),
            is_expired: false,
            is_valid: false,
        }
    }

    pub fn describe(invite: &Invite, client: Option<&Client>, now: DateTime<Utc>) -> Self {
        let is_expired = invite.is_expired(now);
        Self {
            email: invite.email.clone(),
            name: invite.name.clone(),
            client_name: client
                .map(|client| client.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            is_expired,
            is_valid: !is_expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use super::super::domain::{ClientId, ClientRole, InviteId};

    fn invite(expires_at: DateTime<Utc>) -> Invite {
        Invite {
            id: InviteId::from("invite-1"),
            email: "ada@example.org".into(),
            name: Some("Ada".into()),
            client_id: ClientId::from("client-1"),
            client_role: ClientRole::Viewer,
            token: generate_token(),
            expires_at,
            created_by: None,
            created_at: expires_at - Duration::days(7),
        }
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let first = generate_token();
        let second = generate_token();
        assert_eq!(first.len(), INVITE_TOKEN_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let deadline = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let record = invite(deadline);
        assert!(!record.is_expired(deadline));
        assert!(record.is_expired(deadline + Duration::seconds(1)));
    }

    #[test]
    fn refresh_replaces_token_and_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut record = invite(now);
        let old_token = record.token.clone();
        refresh(&mut record, now, DEFAULT_INVITE_TTL_DAYS);
        assert_ne!(record.token, old_token);
        assert_eq!(record.expires_at, now + Duration::days(7));
    }

    #[test]
    fn describe_reports_expired_invites() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let info = InviteInfo::describe(&invite(now - Duration::hours(1)), None, now);
        assert!(info.is_expired);
        assert!(!info.is_valid);
        assert_eq!(info.client_name, "Unknown");
    }
}
