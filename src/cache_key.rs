use md5::{Digest, Md5};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::Error;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{32}$").expect("valid cache key pattern"));

/// Content address of a source locator: the MD5 digest of the raw locator
/// string rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(locator: &str) -> CacheKey {
        let digest = Md5::digest(locator.as_bytes());
        CacheKey(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if KEY_PATTERN.is_match(s) {
            Ok(CacheKey(s.to_string()))
        } else {
            Err(Error::BadRequest(format!("Invalid cache key `{}`", s)))
        }
    }
}
