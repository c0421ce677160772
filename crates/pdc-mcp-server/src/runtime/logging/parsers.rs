use std::{fmt::Display, str::FromStr};

use serde::{Deserialize as _, Deserializer};

/// Deserialize a value from its string representation
pub(crate) fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    String::deserialize(deserializer)?
        .parse()
        .map_err(serde::de::Error::custom)
}
