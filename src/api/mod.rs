//! Handler-facing request and response types
//!
//! Handlers receive an [`ApiRequest`] with lazily parsed `cookies`, `query`
//! and `body`, and emit output through the `status`/`send`/`json` helpers of
//! [`ApiResponse`].

pub mod body;
pub mod lazy;
pub mod request;
pub mod response;

pub use body::Body;
pub use request::ApiRequest;
pub use response::{ApiResponse, Payload};

use crate::error::HandlerError;
use async_trait::async_trait;

/// A serverless-style `(request, response)` function
///
/// Returning an error makes the dispatcher answer with a generic error page.
#[async_trait(?Send)]
pub trait Handler {
    async fn call(&self, req: &mut ApiRequest, res: &mut ApiResponse) -> Result<(), HandlerError>;
}
