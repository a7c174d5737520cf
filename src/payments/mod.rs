mod adyen;
mod notification;
mod redact;

pub use adyen::*;
pub use notification::*;
pub use redact::{redact_request, redact_response};
