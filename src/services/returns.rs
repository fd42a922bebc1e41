//! Return validation: outstanding fines block a return

use rust_decimal::Decimal;
use uuid::Uuid;

use super::fines::FinesService;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ReturnValidator {
    fines: FinesService,
}

impl ReturnValidator {
    pub fn new(fines: FinesService) -> Self {
        Self { fines }
    }

    /// Fail with `UnpaidFines` while the user owes anything on this book
    pub async fn check(&self, book_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let fines = self.fines.pending_fines_for(book_id, user_id).await?;
        if fines.is_empty() {
            return Ok(());
        }

        let total: Decimal = fines.iter().map(|f| f.fine_amount).sum();
        tracing::info!(
            "Return of book {} by user {} blocked by {} unpaid fine(s) totalling {}",
            book_id,
            user_id,
            fines.len(),
            total
        );
        Err(AppError::UnpaidFines { total, fines })
    }
}
