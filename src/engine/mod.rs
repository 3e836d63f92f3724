pub mod arbiter;
pub mod dispatch;
pub mod fees;
