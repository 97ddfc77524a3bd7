//! Background cleanup: prune idle rate-limit buckets and, on the membership
//! database, expired or used tokens.

use crate::rate_limit::RateLimiter;
use crate::storage::Storage;
use chrono::Utc;
use lifedash_core::TokenService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

pub fn spawn_cleanup_task(
    limiters: Vec<RateLimiter>,
    token_storage: Option<Storage>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            for limiter in &limiters {
                limiter.prune();
            }
            if let Some(storage) = &token_storage {
                if let Err(e) = run_cleanup(storage) {
                    tracing::error!("Cleanup error: {}", e);
                }
            }
        }
    })
}

fn run_cleanup(storage: &Storage) -> Result<(), String> {
    let conn = storage.conn().map_err(|e| e.to_string())?;
    let removed = TokenService::new(&conn)
        .prune(Utc::now())
        .map_err(|e| e.to_string())?;

    tracing::debug!(removed, "Cleanup completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifedash_core::database::Schema;
    use lifedash_core::TokenKind;

    #[test]
    fn test_run_cleanup_prunes_expired() {
        let storage = Storage::in_memory(Schema::Membership).unwrap();
        {
            let conn = storage.conn().unwrap();
            conn.execute(
                "INSERT INTO members (email, first_name, last_name, password_hash, created_at)
                 VALUES ('m@example.com', 'M', 'E', 'x', 'now')",
                [],
            )
            .unwrap();
            TokenService::new(&conn)
                .store_code(
                    "m@example.com",
                    TokenKind::EmailVerification,
                    "1234",
                    chrono::Duration::minutes(10),
                    Utc::now() - chrono::Duration::hours(1),
                )
                .unwrap();
        }

        run_cleanup(&storage).unwrap();

        let count: i64 = storage
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
