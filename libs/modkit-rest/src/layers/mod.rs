//! Tower layers used by the default transport
//!
//! - [`SpanLayer`] - wraps each outbound request in an `outgoing_http` span
//! - [`RedirectPolicy`] - same-origin, downgrade and credential rules for redirects

mod redirect;
mod span;

pub use redirect::RedirectPolicy;
pub use span::{SpanLayer, SpanService};
