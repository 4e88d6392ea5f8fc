//! Input validation shared by human and bot actions

pub mod rate_limiter;
