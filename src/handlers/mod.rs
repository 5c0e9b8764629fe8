pub mod dashboard;
pub mod dashboard_ws;
pub mod session;
