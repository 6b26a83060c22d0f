pub mod expiry_sweeper;
pub mod notifier;
