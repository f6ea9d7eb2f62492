use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

/// Caller identity taken from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
    pub clinic_id: u64,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ))
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        match AuthUser::from_claims(claims) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ErrorUnauthorized("Invalid role"))),
        }
    }
}

impl AuthUser {
    pub fn from_claims(claims: crate::models::Claims) -> Option<Self> {
        let role = Role::from_id(claims.role)?;
        Some(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            clinic_id: claims.clinic_id,
        })
    }

    pub fn require_manager(&self) -> AttendanceResult<()> {
        if self.role.can_manage() {
            Ok(())
        } else {
            Err(AttendanceError::authorization("Manager/Admin only"))
        }
    }

    /// Resolves the user a request is about; acting on someone else needs a manager.
    pub fn target_user(&self, requested: Option<u64>) -> AttendanceResult<u64> {
        match requested {
            Some(user_id) if user_id != self.user_id => {
                self.require_manager()?;
                Ok(user_id)
            }
            _ => Ok(self.user_id),
        }
    }
}
