// Adapters layer: concrete implementations of the domain ports over HTTP.

pub mod notifier;
pub mod recurly;

pub use notifier::WebhookNotifier;
pub use recurly::RecurlyClient;
