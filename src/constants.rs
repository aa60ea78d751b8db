pub mod profile {

    pub const SYNC_CODE_LEN: usize = 8;

    pub const SYNC_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    pub const SYNC_CODE_TTL_MINUTES: i64 = 15;

    pub const SYNC_CODE_MAX_ATTEMPTS: u32 = 5;

    pub const DISPLAY_NAME_MAX_CHARS: usize = 15;

    pub const AVATAR_KEY_PREFIX: &str = "avatars";
}

pub mod timeouts {
    use std::time::Duration;

    pub const DB_QUERY: Duration = Duration::from_secs(5);

    pub const DB_LISTING: Duration = Duration::from_secs(10);
}

pub mod headers {

    pub const PROFILE_ID: &str = "x-profile-id";

    pub const SECRET_TOKEN: &str = "x-secret-token";

    pub const SERVICE_TOKEN: &str = "x-service-token";

    pub const TELEGRAM_SECRET: &str = "x-telegram-bot-api-secret-token";
}

pub mod moderation {

    pub const MAX_MESSAGE_CHARS: usize = 4000;

    pub const MAX_CALLBACK_ID_BYTES: usize = 50;

    pub const APPROVED_SUFFIX: &str = "✅ Подтверждено";

    pub const REJECTED_SUFFIX: &str = "❌ Отклонено";
}
