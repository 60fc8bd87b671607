pub const USER_EMAIL: &str = "user_email";
