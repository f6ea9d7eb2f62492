pub mod qr_cache;
pub mod retry;
