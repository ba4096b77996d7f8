//! Host-side value representations exchanged with a context.

mod dom;
mod number;
mod wrapper;

pub use dom::{DomArgument, DomEvent, DomEventListener, DomValue};
pub use number::format_number;
pub use wrapper::JsValueWrapper;
