pub mod attendance;
pub mod membership;
pub mod qr_code;
pub mod role;
pub mod schedule;
pub mod statistics;
