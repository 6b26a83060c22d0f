pub mod payment;
pub mod user;

pub use payment::{Decision, PaymentReport, PaymentStatus, ReportSubmission};
pub use user::VipUser;
