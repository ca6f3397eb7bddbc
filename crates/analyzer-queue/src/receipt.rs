//! Delivery receipts.
//!
//! A receipt is `<job id>|<token>`. The token is fresh for each delivery,
//! so a worker whose lease expired and was redelivered holds a receipt
//! the queue no longer recognises.

use uuid::Uuid;

use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::Delivery;
use analyzer_core::types::JobId;

const SEPARATOR: char = '|';

/// Mint a receipt for a new delivery of `job_id`.
pub fn issue(job_id: JobId) -> String {
    format!("{job_id}{SEPARATOR}{}", Uuid::new_v4().simple())
}

/// Recover the delivery a receipt stands for.
pub fn parse(receipt: &str) -> AppResult<Delivery> {
    let (id, token) = receipt
        .split_once(SEPARATOR)
        .ok_or_else(|| AppError::queue(format!("Malformed delivery receipt: '{receipt}'")))?;
    if token.is_empty() {
        return Err(AppError::queue(format!(
            "Delivery receipt has no token: '{receipt}'"
        )));
    }
    let job_id = id
        .parse::<JobId>()
        .map_err(|e| AppError::queue(format!("Receipt carries an invalid job id: {e}")))?;
    Ok(Delivery {
        job_id,
        receipt: receipt.to_string(),
    })
}
