use std::cell::RefCell;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// 編輯器生命週期事件的操作種類。 / Operation kind carried by a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EditOp {
    Opened,
    Loaded,
    Saved,
    Closed,
    Edited,
    Undone,
    Redone,
}

impl EditOp {
    pub fn as_str(self) -> &'static str {
        match self {
            EditOp::Opened => "opened",
            EditOp::Loaded => "loaded",
            EditOp::Saved => "saved",
            EditOp::Closed => "closed",
            EditOp::Edited => "edited",
            EditOp::Undone => "undone",
            EditOp::Redone => "redone",
        }
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 傳遞給觀察者的生命週期事件。 / Lifecycle event delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorEvent {
    pub path: PathBuf,
    pub op: EditOp,
    pub at_unix: i64,
}

impl EditorEvent {
    pub fn now(path: impl Into<PathBuf>, op: EditOp) -> Self {
        Self {
            path: path.into(),
            op,
            at_unix: current_timestamp(),
        }
    }
}

/// 觀察者處理事件時的失敗。 / Failure raised by an observer while handling an event.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("observer I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}

/// 生命週期事件的訂閱者；僅供稽核與統計，絕不參與控制流程。 /
/// Subscriber to lifecycle events; used for auditing and metrics, never for
/// control flow.
pub trait Observer {
    fn name(&self) -> &str;
    fn on_event(&mut self, event: &EditorEvent) -> Result<(), ObserverError>;
}

/// 工作區與其編輯器共享的同步事件匯流排。 / Synchronous event bus shared by the workspace and its editors.
///
/// 單執行緒設計：以 `Rc`/`RefCell` 共享，無鎖。 / Single-threaded by design:
/// shared through `Rc`/`RefCell`, no locking.
#[derive(Clone, Default)]
pub struct ObserverBus {
    observers: Rc<RefCell<Vec<Rc<RefCell<dyn Observer>>>>>,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 註冊觀察者；同名觀察者重複註冊不會造成重複遞送。 / Registers an observer; re-registering the same name is idempotent.
    pub fn register(&self, observer: Rc<RefCell<dyn Observer>>) {
        let name = observer.borrow().name().to_string();
        let mut observers = self.observers.borrow_mut();
        if observers.iter().any(|existing| existing.borrow().name() == name) {
            return;
        }
        observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.borrow().is_empty()
    }

    /// 依註冊順序同步遞送事件；單一觀察者失敗不阻斷後續遞送。 /
    /// Delivers the event synchronously in registration order; a failing
    /// observer never blocks delivery to the rest.
    pub fn notify(&self, event: &EditorEvent) {
        let observers: Vec<Rc<RefCell<dyn Observer>>> =
            self.observers.borrow().iter().cloned().collect();
        for observer in observers {
            let outcome = observer.borrow_mut().on_event(event);
            if let Err(err) = outcome {
                let name = observer.borrow().name().to_string();
                eprintln!("observer {name:?} failed on {}: {err}", event.op);
            }
        }
    }
}

impl fmt::Debug for ObserverBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBus")
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}

pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: String,
        seen: Rc<RefCell<Vec<(String, EditOp)>>>,
        fail: bool,
    }

    impl Observer for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_event(&mut self, event: &EditorEvent) -> Result<(), ObserverError> {
            if self.fail {
                return Err(ObserverError::Other("boom".into()));
            }
            self.seen
                .borrow_mut()
                .push((self.name.clone(), event.op));
            Ok(())
        }
    }

    fn recorder(
        name: &str,
        seen: &Rc<RefCell<Vec<(String, EditOp)>>>,
        fail: bool,
    ) -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder {
            name: name.to_string(),
            seen: Rc::clone(seen),
            fail,
        }))
    }

    #[test]
    fn delivery_follows_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bus = ObserverBus::new();
        bus.register(recorder("first", &seen, false));
        bus.register(recorder("second", &seen, false));

        bus.notify(&EditorEvent::now("a.txt", EditOp::Saved));
        assert_eq!(
            *seen.borrow(),
            vec![
                ("first".to_string(), EditOp::Saved),
                ("second".to_string(), EditOp::Saved),
            ]
        );
    }

    #[test]
    fn duplicate_registration_delivers_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bus = ObserverBus::new();
        let observer = recorder("audit", &seen, false);
        bus.register(observer.clone());
        bus.register(observer);
        assert_eq!(bus.len(), 1);

        bus.notify(&EditorEvent::now("a.txt", EditOp::Edited));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failing_observer_does_not_block_later_ones() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bus = ObserverBus::new();
        bus.register(recorder("broken", &seen, true));
        bus.register(recorder("healthy", &seen, false));

        bus.notify(&EditorEvent::now("a.txt", EditOp::Closed));
        assert_eq!(
            *seen.borrow(),
            vec![("healthy".to_string(), EditOp::Closed)]
        );
    }
}
