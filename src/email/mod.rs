pub mod models;
pub mod notifier;
pub mod sender;
pub mod templates;

pub use models::{EmailFailure, EmailMessage, EmailOptions, EmailReport, Winner, WinnerKind};
pub use notifier::{collect_winners, plan_emails, WinnerNotifier};
pub use sender::{EmailError, EmailSender, GraphqlEmailSender, LoggingEmailSender};
