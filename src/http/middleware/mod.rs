//! Request middleware.

pub mod interceptor;

pub use interceptor::{instrument, intercept, Interceptor, RequestContext, CLIENT_CLOSED_REQUEST};
