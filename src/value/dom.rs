use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Value shape understood by the DOM layer. Integral numbers keep their integer width.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DomValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Int32(i32),
    Uint32(u32),
    Double(f64),
    String(String),
    Array(Vec<DomValue>),
    Object(IndexMap<String, DomValue>),
}

impl DomValue {
    /// Numeric view regardless of the integer width it was stored with.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DomValue::Int32(n) => Some(f64::from(*n)),
            DomValue::Uint32(n) => Some(f64::from(*n)),
            DomValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DomValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Payload handed to a DOM operation: either a structured value or an opaque binary blob.
#[derive(Debug, Clone, PartialEq)]
pub enum DomArgument {
    Object(DomValue),
    Bson(Vec<u8>),
}

pub type DomEventListener = Rc<dyn Fn(&DomEvent)>;

/// A DOM event that script code can subscribe to.
pub struct DomEvent {
    event_type: String,
    target_id: u32,
    value: Option<DomValue>,
    listeners: RefCell<Vec<DomEventListener>>,
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("event_type", &self.event_type)
            .field("target_id", &self.target_id)
            .field("value", &self.value)
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl DomEvent {
    pub fn new(event_type: &str, target_id: u32, value: Option<DomValue>) -> Self {
        DomEvent {
            event_type: event_type.to_string(),
            target_id,
            value,
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target_id(&self) -> u32 {
        self.target_id
    }

    pub fn value(&self) -> Option<&DomValue> {
        self.value.as_ref()
    }

    pub fn add_listener(&self, listener: DomEventListener) {
        self.listeners.borrow_mut().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Calls every listener in registration order and returns how many ran.
    pub fn fire(&self) -> usize {
        // Listeners may register more listeners while running.
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            listener(self);
        }
        listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn fire_runs_listeners_in_order() {
        let event = DomEvent::new("click", 7, Some(DomValue::Int32(1)));
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let order = Rc::clone(&order);
            event.add_listener(Rc::new(move |e: &DomEvent| order.borrow_mut().push(format!("{tag}:{}", e.target_id()))));
        }
        assert_eq!(event.fire(), 2);
        assert_eq!(*order.borrow(), vec!["a:7".to_string(), "b:7".to_string()]);
    }

    #[test]
    fn listener_may_subscribe_while_firing() {
        let event = Rc::new(DomEvent::new("load", 1, None));
        let hits = Rc::new(Cell::new(0));
        let weak = Rc::downgrade(&event);
        let counter = Rc::clone(&hits);
        event.add_listener(Rc::new(move |_: &DomEvent| {
            counter.set(counter.get() + 1);
            if let Some(event) = weak.upgrade() {
                event.add_listener(Rc::new(|_: &DomEvent| {}));
            }
        }));
        assert_eq!(event.fire(), 1);
        assert_eq!(event.listener_count(), 2);
        assert_eq!(hits.get(), 1);
    }
}
