//! Sign-in and session expiry for the front-desk tool.
//!
//! Sessions are plain values; nothing here schedules itself. Expiry is driven
//! from outside by [`run_session_watchdog`] or by checking
//! [`Session::is_active`] before privileged actions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, mpsc::Receiver};
use tokio::time;

use crate::error::{BenefitError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Staff,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Staff => f.write_str("staff"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: UserIdentity,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Fails when `now + timeout` falls outside the representable date range.
    pub fn start(identity: UserIdentity, now: DateTime<Utc>, timeout: Duration) -> Result<Self> {
        let expires_at = now.checked_add_signed(timeout).ok_or_else(|| {
            BenefitError::validation("session_timeout", format!("Expiry {} after {} is out of range", timeout, now))
        })?;
        Ok(Self { identity, expires_at })
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.identity.role)
    }

    /// Fail unless the session is live and holds one of `allowed`.
    pub fn authorize(&self, now: DateTime<Utc>, allowed: &[Role]) -> Result<()> {
        if !self.is_active(now) {
            return Err(BenefitError::SessionExpired(self.identity.email.clone()));
        }
        if !self.has_role(allowed) {
            return Err(BenefitError::Authentication(format!(
                "{} lacks the required role",
                self.identity.email
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct Credential {
    email: String,
    password: String,
    role: Role,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// In-memory user store for the simulator.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<Credential>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, email: &str, password: &str, role: Role) -> Self {
        self.users.push(Credential {
            email: email.to_string(),
            password: password.to_string(),
            role,
        });
        self
    }

    /// The two demo accounts the simulator ships with.
    pub fn demo() -> Self {
        Self::new()
            .with_user("admin@example.com", "admin123", Role::Admin)
            .with_user("staff@example.com", "staff123", Role::Staff)
    }

    pub fn authenticate(&self, email: &str, password: &str, now: DateTime<Utc>, timeout: Duration) -> Result<Session> {
        let user = self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()) && u.password == password)
            .ok_or_else(|| BenefitError::Authentication("Invalid email or password".to_string()))?;
        tracing::info!(email = %user.email, role = %user.role, "Signed in");
        Session::start(
            UserIdentity {
                email: user.email.clone(),
                role: user.role,
            },
            now,
            timeout,
        )
    }
}

/// The current session, shared between the command loop and the watchdog.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    inner: Arc<Mutex<Option<Session>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sign_in(&self, session: Session) {
        *self.inner.lock().await = Some(session);
    }

    /// The stored session, expired or not.
    pub async fn peek(&self) -> Option<Session> {
        self.inner.lock().await.clone()
    }

    /// The session if it is still active at `now`; an expired one is dropped.
    pub async fn current(&self, now: DateTime<Utc>) -> Option<Session> {
        let mut guard = self.inner.lock().await;
        match guard.as_ref() {
            Some(session) if session.is_active(now) => Some(session.clone()),
            Some(_) => {
                guard.take();
                None
            }
            None => None,
        }
    }

    /// Drop the session if it expired before `now`. Returns the expired session.
    pub async fn expire_if_due(&self, now: DateTime<Utc>) -> Option<Session> {
        let mut guard = self.inner.lock().await;
        if guard.as_ref().is_some_and(|s| !s.is_active(now)) {
            return guard.take();
        }
        None
    }
}

/// Periodically clears an expired session from `slot` until `shutdown_rx`
/// fires or closes.
pub async fn run_session_watchdog(slot: SessionSlot, period: StdDuration, mut shutdown_rx: Receiver<()>) {
    let mut interval = time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(expired) = slot.expire_if_due(Utc::now()).await {
                    tracing::info!(email = %expired.identity.email, "Session expired, signed out");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_authenticate_demo_users() {
        let directory = UserDirectory::demo();
        let session = directory
            .authenticate("Staff@Example.com", "staff123", noon(), Duration::minutes(30))
            .unwrap();
        assert_eq!(session.identity.role, Role::Staff);
        assert_eq!(session.expires_at, noon() + Duration::minutes(30));

        let err = directory
            .authenticate("staff@example.com", "wrong", noon(), Duration::minutes(30))
            .unwrap_err();
        assert!(matches!(err, BenefitError::Authentication(_)));
    }

    #[test]
    fn test_session_expiry() {
        let session = UserDirectory::demo()
            .authenticate("admin@example.com", "admin123", noon(), Duration::minutes(30))
            .unwrap();
        assert!(session.is_active(noon() + Duration::minutes(29)));
        assert!(!session.is_active(noon() + Duration::minutes(30)));
        assert_eq!(session.remaining(noon() + Duration::minutes(10)), Duration::minutes(20));
        assert_eq!(session.remaining(noon() + Duration::hours(2)), Duration::zero());
    }

    #[test]
    fn test_authorize_checks_role_and_expiry() {
        let session = UserDirectory::demo()
            .authenticate("staff@example.com", "staff123", noon(), Duration::minutes(30))
            .unwrap();
        assert!(session.authorize(noon(), &[Role::Admin, Role::Staff]).is_ok());
        assert!(matches!(
            session.authorize(noon(), &[Role::Admin]),
            Err(BenefitError::Authentication(_))
        ));
        assert!(matches!(
            session.authorize(noon() + Duration::hours(1), &[Role::Staff]),
            Err(BenefitError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_overflowing_timeout_fails_sign_in() {
        let err = UserDirectory::demo()
            .authenticate("staff@example.com", "staff123", noon(), Duration::MAX)
            .unwrap_err();
        assert!(matches!(err, BenefitError::Validation { .. }));
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let directory = UserDirectory::demo();
        let rendered = format!("{:?}", directory);
        assert!(rendered.contains("admin@example.com"));
        assert!(!rendered.contains("admin123"));
    }

    #[tokio::test]
    async fn test_slot_drops_expired_session() {
        let slot = SessionSlot::new();
        let session = Session::start(
            UserIdentity {
                email: "staff@example.com".to_string(),
                role: Role::Staff,
            },
            noon(),
            Duration::minutes(30),
        )
        .unwrap();
        slot.sign_in(session.clone()).await;
        assert_eq!(slot.current(noon()).await, Some(session.clone()));
        assert!(slot.expire_if_due(noon()).await.is_none());
        assert_eq!(slot.current(noon() + Duration::hours(1)).await, None);
        assert_eq!(slot.current(noon()).await, None);
    }

    #[tokio::test]
    async fn test_watchdog_signs_out_expired_session() {
        let slot = SessionSlot::new();
        let already_expired = Session::start(
            UserIdentity {
                email: "admin@example.com".to_string(),
                role: Role::Admin,
            },
            Utc::now() - Duration::hours(1),
            Duration::minutes(30),
        )
        .unwrap();
        slot.sign_in(already_expired).await;

        let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
        let handle = tokio::spawn(run_session_watchdog(
            slot.clone(),
            StdDuration::from_millis(10),
            shutdown_rx,
        ));

        let mut cleared = false;
        for _ in 0..50 {
            if slot.peek().await.is_none() {
                cleared = true;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        let _ = shutdown_tx.send(()).await;
        handle.await.unwrap();
        assert!(cleared, "Watchdog should have cleared the expired session");
    }
}
