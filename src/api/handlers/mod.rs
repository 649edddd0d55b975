pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod otp;
pub(crate) mod pages;
pub(crate) mod types;
pub(crate) mod utils;
