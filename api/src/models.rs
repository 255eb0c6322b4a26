use api_response::fields::FieldMarker::{AutoTrim, NoTrim, XssCheck};
use api_response::validation::{validate_email, validate_length, validate_required};
use api_response::{FieldError, FieldSpec, StringFields, StringPolicy, Validatable, ValidationBuilder};
use serde::{Deserialize, Serialize};

const MIN_NAME_LENGTH: usize = 1;
const MAX_NAME_LENGTH: usize = 100;
const MAX_BIO_LENGTH: usize = 2000;
const MAX_COMMENT_LENGTH: usize = 5000;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
}

/// Request body for POST /api/users.
///
/// `password` carries no marker and is kept byte-for-byte.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
}

impl StringFields for CreateUserRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("name", &[AutoTrim]),
        FieldSpec::new("email", &[AutoTrim]),
        FieldSpec::new("bio", &[AutoTrim, XssCheck]),
    ];
}

impl Validatable for CreateUserRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut builder = ValidationBuilder::new();

        builder
            .check("name", || validate_required(&self.name))
            .check("name", || validate_length(&self.name, MIN_NAME_LENGTH, MAX_NAME_LENGTH))
            .check("email", || validate_email(&self.email))
            .check("password", || validate_length(&self.password, 8, 128))
            .ensure(
                !self.password.trim().eq_ignore_ascii_case(&self.email),
                "password",
                "must differ from email",
            );

        if let Some(ref bio) = self.bio {
            builder.check("bio", || validate_length(bio, 0, MAX_BIO_LENGTH));
        }

        builder.build()
    }
}

/// Request body for POST /api/comments.
///
/// Everything is trimmed and markup-checked by default; the signature keeps
/// its surrounding whitespace but is still checked.
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub author: String,
    pub content: String,
    pub signature: Option<String>,
}

impl StringFields for CreateCommentRequest {
    const POLICY: StringPolicy = StringPolicy::TrimAndRejectMarkup;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::new("signature", &[NoTrim])];
}

impl Validatable for CreateCommentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        ValidationBuilder::new()
            .check("author", || validate_required(&self.author))
            .check("content", || validate_required(&self.content))
            .check("content", || validate_length(&self.content, 1, MAX_COMMENT_LENGTH))
            .build()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub author: String,
    pub content: String,
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchParams {
    pub name: String,
    pub limit: Option<usize>,
}
