//! Request body validation.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;
use crate::models::{
    ChangePasswordRequest, CreateUserRequest, LoginRequest, Role, Status, TerminateUserRequest,
    UpdateUserRequest,
};

const USERNAME_LEN: (usize, usize) = (3, 50);
const PHONE_LEN: (usize, usize) = (11, 15);
const PASSWORD_LEN: (usize, usize) = (6, 20);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// JSON body that has been deserialized and passed [`Validate`].
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| AppError::BadRequest(e.body_text()))?;
        value.validate().map_err(AppError::Validation)?;
        Ok(ValidatedJson(value))
    }
}

#[derive(Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn length(&mut self, field: &'static str, value: &str, (min, max): (usize, usize)) {
        let len = value.chars().count();
        if len < min || len > max {
            self.0.push(FieldError::new(
                field,
                format!("must be between {min} and {max} characters"),
            ));
        }
    }

    fn phone(&mut self, value: &str) {
        let len = value.chars().count();
        if len < PHONE_LEN.0 || len > PHONE_LEN.1 || !value.chars().all(|c| c.is_ascii_digit()) {
            self.0.push(FieldError::new(
                "phone",
                format!("must be {} to {} digits", PHONE_LEN.0, PHONE_LEN.1),
            ));
        }
    }

    fn role(&mut self, value: &str) {
        if Role::parse(value).is_none() {
            self.0.push(FieldError::new(
                "role",
                "must be one of admin, manager, waiter, chef",
            ));
        }
    }

    fn status(&mut self, value: &str) {
        if Status::parse(value).is_none() {
            self.0.push(FieldError::new(
                "status",
                "must be one of active, inactive, deleted, pending",
            ));
        }
    }

    fn required(&mut self, field: &'static str, value: &str) -> bool {
        if value.is_empty() {
            self.0.push(FieldError::new(field, "is required"));
            return false;
        }
        true
    }

    fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.0.is_empty() { Ok(()) } else { Err(self.0) }
    }
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.length("username", &self.username, USERNAME_LEN);
        errors.phone(&self.phone);
        errors.length("password", &self.password, PASSWORD_LEN);
        match self.role.as_deref() {
            Some(role) => errors.role(role),
            None => errors.0.push(FieldError::new("role", "is required")),
        }
        errors.finish()
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        if let Some(username) = &self.username {
            errors.length("username", username, USERNAME_LEN);
        }
        if let Some(phone) = &self.phone {
            errors.phone(phone);
        }
        if let Some(role) = &self.role {
            errors.role(role);
        }
        if let Some(status) = &self.status {
            errors.status(status);
        }
        errors.finish()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.length("phone", &self.phone, PHONE_LEN);
        errors.length("password", &self.password, PASSWORD_LEN);
        errors.finish()
    }
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.required("old_password", &self.old_password);
        if errors.required("new_password", &self.new_password) {
            errors.length("new_password", &self.new_password, PASSWORD_LEN);
        }
        errors.finish()
    }
}

impl Validate for TerminateUserRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        if let Some(status) = &self.status {
            errors.status(status);
        }
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(username: &str, phone: &str, password: &str, role: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            phone: phone.into(),
            password: password.into(),
            role: role.map(Into::into),
        }
    }

    fn fields(result: Result<(), Vec<FieldError>>) -> Vec<&'static str> {
        result.unwrap_err().into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn accepts_valid_signup() {
        assert!(create("Alice", "01711112222", "secret1", Some("chef")).validate().is_ok());
    }

    #[test]
    fn reports_every_bad_field() {
        let req = create("Al", "0171-111", "123", Some("owner"));
        assert_eq!(fields(req.validate()), vec!["username", "phone", "password", "role"]);
    }

    #[test]
    fn role_is_required_on_signup() {
        let req = create("Alice", "01711112222", "secret1", None);
        assert_eq!(fields(req.validate()), vec!["role"]);
    }

    #[test]
    fn phone_must_be_digits() {
        let req = create("Alice", "0171111222a", "secret1", Some("waiter"));
        assert_eq!(fields(req.validate()), vec!["phone"]);
    }

    #[test]
    fn update_only_checks_present_fields() {
        assert!(UpdateUserRequest::default().validate().is_ok());

        let req = UpdateUserRequest {
            status: Some("archived".into()),
            ..Default::default()
        };
        assert_eq!(fields(req.validate()), vec!["status"]);
    }

    #[test]
    fn change_password_requires_both() {
        let req = ChangePasswordRequest {
            old_password: String::new(),
            new_password: "abc".into(),
        };
        assert_eq!(fields(req.validate()), vec!["old_password", "new_password"]);
    }
}
