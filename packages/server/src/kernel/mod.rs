//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod producers;
pub mod scheduled_tasks;
pub mod telegram_notifier;

pub use deps::{connect_repository, telegram_notifier, ServerDeps};
pub use producers::{RemoteOkProducer, SampleProducer, WeWorkRemotelyProducer};
pub use scheduled_tasks::{run_scheduled, start_scheduler, trigger_background_run};
pub use telegram_notifier::{DisabledNotifier, TelegramNotifier};
