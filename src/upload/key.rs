//! Remote key derivation
//!
//! Keys look like `{folder}/{timestamp_ms}-{token}.{ext}`. The millisecond
//! timestamp plus a random token keeps keys practically unique, which is what
//! lets the store run with overwrites disabled.

/// Length of the random token in a key
pub const TOKEN_LEN: usize = 8;

/// Extension of a file name, without the dot
pub fn extension(name: &str) -> Option<&str> {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => Some(ext),
        _ => None,
    }
}

/// Build a key from explicit parts
pub fn derive_key(folder_prefix: &str, source_name: &str, timestamp_ms: i64, token: &str) -> String {
    let folder = folder_prefix.trim_matches('/');
    let mut key = String::with_capacity(folder.len() + source_name.len() + 32);

    if !folder.is_empty() {
        key.push_str(folder);
        key.push('/');
    }
    key.push_str(&format!("{}-{}", timestamp_ms, token));
    if let Some(ext) = extension(source_name) {
        key.push('.');
        key.push_str(ext);
    }
    key
}

/// Build a fresh key for `source_name` using the current time
pub fn generate_key(folder_prefix: &str, source_name: &str) -> String {
    derive_key(
        folder_prefix,
        source_name,
        chrono::Utc::now().timestamp_millis(),
        &random_token(),
    )
}

fn random_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}
