use crate::error::{AppError, AppResult};
use crate::models::User;

/// Object-level check for mutations of owned content: the author may change
/// their own recipe, an administrator may change anything. Reads never go
/// through here.
pub fn ensure_author_or_admin(user: &User, author_id: i64) -> AppResult<()> {
    if user.is_admin() || user.id == author_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the author or an administrator can change this content".to_string(),
        ))
    }
}
