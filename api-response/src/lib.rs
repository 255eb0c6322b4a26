//! Response envelopes, RFC 9457 problem details, per-field string processing
//! and request trace ids for axum services.
//!
//! Wire everything onto a router with [`ApiResponseRouterExt`]:
//!
//! ```ignore
//! use api_response::{ApiResponseConfig, ApiResponseRouterExt};
//!
//! let app = Router::new()
//!     .route("/users", post(create_user))
//!     .with_api_response(&ApiResponseConfig::from_env());
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod fields;
pub mod response;
pub mod router;
pub mod trace;
pub mod validation;

pub use config::ApiResponseConfig;
pub use error::{ApiError, ApiException, ApiResult, ProblemDetail, APPLICATION_PROBLEM_JSON};
pub use extract::{Path, Query, ValidatedJson};
pub use fields::{FieldMarker, FieldModes, FieldSpec, StringFields, StringMode, StringPolicy};
pub use response::{ApiResponse, ApiResponseBuilder};
pub use router::ApiResponseRouterExt;
pub use trace::{TraceId, TRACE_ID_HEADER};
pub use validation::{FieldError, Validatable, ValidationBuilder};
