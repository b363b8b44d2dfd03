mod dispatcher;
mod notifier;
pub mod snapshot;

pub use dispatcher::{run_dispatch_loop, AlertDispatcher, AlertEvent, DispatchError};
pub use notifier::{Notifier, TransportError, WebhookNotifier};
