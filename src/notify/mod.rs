pub mod notifier;

pub use notifier::PassNotifier;
