/// Prefix of the paginated user list cache.
pub const USER_LIST_PREFIX: &str = "get_all_users_";

/// Every cache family derived from the `users` table. Any write to the table
/// clears all of them.
pub const USER_TABLE_PATTERNS: [&str; 3] = [
    "get_all_users_*",
    "get_payroll_users_*",
    "get_all_users__wise_sell_report*",
];

const RATE_LIMIT_PREFIX: &str = "rate_limit:";

pub fn user_list_key(encoded_query: &str) -> String {
    format!("{}{}", USER_LIST_PREFIX, encoded_query)
}

pub fn rate_limit_key(client: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, client)
}
