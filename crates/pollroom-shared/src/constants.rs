/// Application name
pub const APP_NAME: &str = "Pollroom";

/// Maximum poll question length, in characters
pub const MAX_QUESTION_LEN: usize = 100;

/// Poll timer bounds in seconds (inclusive)
pub const MIN_TIMER_SECS: u32 = 30;
pub const MAX_TIMER_SECS: u32 = 90;

/// Option count bounds per poll (inclusive)
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// Usernames starting with this prefix may moderate
pub const TEACHER_PREFIX: &str = "teacher";

/// Chat messages kept in memory
pub const CHAT_HISTORY_CAPACITY: usize = 100;

/// Chat messages replayed to a client when it joins
pub const CHAT_REPLAY_LIMIT: usize = 50;

/// Default HTTP / WebSocket port (server)
pub const DEFAULT_HTTP_PORT: u16 = 3000;
