pub mod captcha;
pub mod storage;
pub mod telegram;
