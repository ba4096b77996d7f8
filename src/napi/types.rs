use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Opaque handle to a JS value owned by some engine.
///
/// The core never looks inside a handle; all introspection goes through [`crate::napi::Ctx`].
/// Only the backend that produced a handle downcasts it, through [`CtxValue::as_any`].
pub trait CtxValue: Any + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

pub type CtxValueRef = Rc<dyn CtxValue>;

/// Result of a native callback: `Err` carries the JS value to throw.
pub type JsResult<T> = Result<T, CtxValueRef>;

bitflags::bitflags! {
    /// Property descriptor flags. The empty set means writable, enumerable and configurable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttribute: u32 {
        /// Not writable.
        const READ_ONLY = 1 << 0;
        /// Not enumerable.
        const DONT_ENUM = 1 << 1;
        /// Not configurable.
        const DONT_DELETE = 1 << 2;
    }
}

impl PropertyAttribute {
    pub fn writable(self) -> bool {
        !self.contains(PropertyAttribute::READ_ONLY)
    }

    pub fn enumerable(self) -> bool {
        !self.contains(PropertyAttribute::DONT_ENUM)
    }

    pub fn configurable(self) -> bool {
        !self.contains(PropertyAttribute::DONT_DELETE)
    }
}

/// Bytes copied out of an engine byte buffer together with their type tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteBuffer {
    pub bytes: Vec<u8>,
    pub kind: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_flags_map_to_descriptor_bits() {
        let attr = PropertyAttribute::READ_ONLY | PropertyAttribute::DONT_DELETE;
        assert!(!attr.writable());
        assert!(attr.enumerable());
        assert!(!attr.configurable());

        let none = PropertyAttribute::empty();
        assert!(none.writable() && none.enumerable() && none.configurable());
    }
}
