//! Verification challenges
//!
//! One outstanding challenge per principal, persisted so restarts don't
//! invalidate links already handed out. Staleness is judged against the
//! caller's validity window; resetting a stale status is the caller's call
//! ([`VerificationGate::expire`]), the gate runs no background work.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::data::{self, current_timestamp, VerificationStatus, STAT_TOKENS_VERIFIED};
use crate::service::DepotError;
use crate::share::random_alphanumeric;

/// Issues and confirms per-principal challenge tokens
#[derive(Clone)]
pub struct VerificationGate {
    db: Arc<Mutex<Connection>>,
    token_length: usize,
}

impl VerificationGate {
    pub fn new(db: Arc<Mutex<Connection>>, token_length: usize) -> Self {
        Self { db, token_length }
    }

    /// Issue a fresh challenge, replacing any outstanding one
    ///
    /// The principal is unverified until the new token is confirmed.
    pub async fn issue(&self, principal: i64) -> Result<String, DepotError> {
        let token = random_alphanumeric(self.token_length);
        let db = self.db.lock().await;
        data::store_verify_token(&db, principal, &token)?;
        debug!(principal, "verification challenge issued");
        Ok(token)
    }

    /// Confirm a challenge. A mismatch changes nothing.
    pub async fn confirm(&self, principal: i64, token: &str) -> Result<bool, DepotError> {
        self.confirm_at(principal, token, current_timestamp()).await
    }

    /// [`confirm`](Self::confirm) with an explicit unix time
    pub async fn confirm_at(&self, principal: i64, token: &str, now: i64) -> Result<bool, DepotError> {
        let db = self.db.lock().await;
        let confirmed = data::confirm_verify_token(&db, principal, token, now)?;
        if confirmed {
            if let Err(e) = data::increment_stat(&db, STAT_TOKENS_VERIFIED, 1) {
                warn!(error = %e, "failed to count verification");
            }
            info!(principal, "principal verified");
        } else {
            debug!(principal, "verification token mismatch");
        }
        Ok(confirmed)
    }

    /// Stored status, stale or not
    pub async fn status(&self, principal: i64) -> Result<VerificationStatus, DepotError> {
        let db = self.db.lock().await;
        Ok(data::get_verify_status(&db, principal)?)
    }

    /// Verified, and confirmed less than `validity_secs` ago
    pub async fn is_currently_verified(&self, principal: i64, validity_secs: u64) -> Result<bool, DepotError> {
        self.is_currently_verified_at(principal, validity_secs, current_timestamp())
            .await
    }

    /// [`is_currently_verified`](Self::is_currently_verified) with an explicit unix time
    pub async fn is_currently_verified_at(
        &self,
        principal: i64,
        validity_secs: u64,
        now: i64,
    ) -> Result<bool, DepotError> {
        let status = self.status(principal).await?;
        Ok(is_fresh(&status, validity_secs, now))
    }

    /// Drop a stale verification
    pub async fn expire(&self, principal: i64) -> Result<(), DepotError> {
        let db = self.db.lock().await;
        data::reset_verified(&db, principal)?;
        debug!(principal, "verification expired");
        Ok(())
    }
}

/// True if `status` is verified and still inside the validity window
pub fn is_fresh(status: &VerificationStatus, validity_secs: u64, now: i64) -> bool {
    let validity = i64::try_from(validity_secs).unwrap_or(i64::MAX);
    status.verified && now.saturating_sub(status.verified_at) < validity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{get_stat, start_memory_db};

    fn gate() -> VerificationGate {
        let db = Arc::new(Mutex::new(start_memory_db().unwrap()));
        VerificationGate::new(db, 10)
    }

    #[tokio::test]
    async fn test_issue_and_confirm() {
        let gate = gate();
        let token = gate.issue(5).await.unwrap();
        assert_eq!(token.len(), 10);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(!gate.is_currently_verified(5, 3600).await.unwrap());
        assert!(gate.confirm(5, &token).await.unwrap());
        assert!(gate.is_currently_verified(5, 3600).await.unwrap());

        let db = gate.db.lock().await;
        assert_eq!(get_stat(&db, STAT_TOKENS_VERIFIED).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wrong_token_never_verifies() {
        let gate = gate();
        let token = gate.issue(5).await.unwrap();

        let longer = format!("{}x", token);
        let lower = token.to_lowercase();
        for wrong in ["", "x", &token[..9], longer.as_str(), lower.as_str()] {
            if wrong == token {
                continue;
            }
            assert!(!gate.confirm(5, wrong).await.unwrap());
            assert!(!gate.status(5).await.unwrap().verified);
        }
        // Another principal's token doesn't help either
        let other = gate.issue(6).await.unwrap();
        assert!(!gate.confirm(5, &other).await.unwrap());
        assert!(!gate.status(5).await.unwrap().verified);

        assert!(gate.confirm(5, &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_staleness_and_caller_driven_reset() {
        let gate = gate();
        let token = gate.issue(5).await.unwrap();
        gate.confirm_at(5, &token, 1_000).await.unwrap();

        assert!(gate.is_currently_verified_at(5, 100, 1_099).await.unwrap());
        assert!(!gate.is_currently_verified_at(5, 100, 1_100).await.unwrap());

        // Observing staleness doesn't change stored state by itself
        assert!(gate.status(5).await.unwrap().verified);
        gate.expire(5).await.unwrap();
        assert!(!gate.status(5).await.unwrap().verified);
    }

    #[tokio::test]
    async fn test_confirmed_token_cannot_be_reused_after_expiry() {
        let gate = gate();
        let token = gate.issue(5).await.unwrap();
        assert!(gate.confirm_at(5, &token, 1_000).await.unwrap());
        assert!(gate.status(5).await.unwrap().token.is_empty());

        gate.expire(5).await.unwrap();
        assert!(!gate.confirm(5, &token).await.unwrap());
        assert!(!gate.is_currently_verified(5, 3600).await.unwrap());
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_token() {
        let gate = gate();
        let first = gate.issue(5).await.unwrap();
        let second = gate.issue(5).await.unwrap();
        if first != second {
            assert!(!gate.confirm(5, &first).await.unwrap());
        }
        assert!(gate.confirm(5, &second).await.unwrap());
    }

    #[test]
    fn test_is_fresh() {
        let status = VerificationStatus {
            token: "t".into(),
            verified: true,
            verified_at: 50,
        };
        assert!(is_fresh(&status, 10, 59));
        assert!(!is_fresh(&status, 10, 60));
        assert!(is_fresh(&status, u64::MAX, i64::MAX));
        assert!(!is_fresh(&VerificationStatus::default(), 10, 0));
    }
}
