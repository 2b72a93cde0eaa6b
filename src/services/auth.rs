use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{SetPasswordRequest, SignupRequest, User, ROLE_ADMIN, ROLE_USER};
use crate::services::UserService;
use crate::utils::password::{hash_password, verify_password};
use validator::Validate;

pub struct AuthService<'a> {
    db: &'a Database,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a Database) -> Self {
        AuthService { db }
    }

    /// Registers a new account. The first account on an empty database becomes
    /// the administrator.
    pub async fn signup(&self, form: &SignupRequest) -> AppResult<User> {
        form.validate()?;

        let user_service = UserService::new(self.db);
        let role = if user_service.count_users().await? == 0 {
            ROLE_ADMIN
        } else {
            ROLE_USER
        };

        let password_hash = hash_password(&form.password)?;
        user_service.create_user(form, &password_hash, role).await
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let user = UserService::new(self.db)
            .get_user_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if verify_password(password, &user.password)? {
            Ok(user)
        } else {
            tracing::debug!("Wrong password for user {}", user.id);
            Err(AppError::InvalidCredentials)
        }
    }

    pub async fn set_password(&self, user: &User, form: &SetPasswordRequest) -> AppResult<()> {
        form.validate()?;

        if !verify_password(&form.current_password, &user.password)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(&form.new_password)?;
        UserService::new(self.db)
            .update_password(user.id, &password_hash)
            .await?;

        tracing::info!("Password changed for user {}", user.id);
        Ok(())
    }
}
