// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.


//! Serialization helpers.

use crate::{Error, ErrorKind, Result};
use chrono::{DateTime, Utc};
use serde::{
    de::{self, DeserializeOwned, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{fmt, marker::PhantomData, str::FromStr};

pub fn json_serialize<T>(val: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    serde_json::to_vec(val).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
}

pub fn json_deserialize<'a, T>(buf: &'a [u8]) -> Result<T>
where
    T: Deserialize<'a>,
{
    serde_json::from_slice(buf).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
}

/// Converts an already parsed json value into a concrete type.
pub fn json_from_value<T>(value: serde_json::Value) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
}

/// Parse an RFC3339 timestamp as reported by the chain.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| {
            Error::new_ext(
                ErrorKind::MalformedData,
                format!("bad timestamp '{}': {}", timestamp, err),
            )
        })
}

struct StrOrNumVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for StrOrNumVisitor<T>
where
    T: FromStr + TryFrom<u64> + TryFrom<i64>,
    <T as FromStr>::Err: fmt::Display,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer or a decimal string")
    }

    fn visit_u64<E>(self, value: u64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        <T as TryFrom<u64>>::try_from(value)
            .map_err(|_| E::custom(format!("integer {} out of range", value)))
    }

    fn visit_i64<E>(self, value: i64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        <T as TryFrom<i64>>::try_from(value)
            .map_err(|_| E::custom(format!("integer {} out of range", value)))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        value.parse::<T>().map_err(E::custom)
    }
}

/// Deserializes an integer that the chain may encode either as a json number
/// or as a decimal string (Tendermint encodes 64 bit values as strings).
pub fn str_or_num<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + TryFrom<u64> + TryFrom<i64>,
    <T as FromStr>::Err: fmt::Display,
{
    deserializer.deserialize_any(StrOrNumVisitor(PhantomData))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Serialize, Debug, PartialEq)]
    struct Sample {
        #[serde(deserialize_with = "str_or_num")]
        height: u64,
        #[serde(deserialize_with = "str_or_num")]
        power: i64,
    }

    #[test]
    fn numbers_from_strings() {
        let buf = br#"{"height":"42","power":"-7"}"#;

        let sample: Sample = json_deserialize(buf).unwrap();

        assert_eq!(sample, Sample { height: 42, power: -7 });
    }

    #[test]
    fn numbers_from_numbers() {
        let buf = br#"{"height":42,"power":7}"#;

        let sample: Sample = json_deserialize(buf).unwrap();

        assert_eq!(sample, Sample { height: 42, power: 7 });
    }

    #[test]
    fn negative_height_is_malformed() {
        let buf = br#"{"height":-1,"power":7}"#;

        let err = json_deserialize::<Sample>(buf).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedData);
    }

    #[test]
    fn garbage_string_is_malformed() {
        let buf = br#"{"height":"forty-two","power":7}"#;

        let err = json_deserialize::<Sample>(buf).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedData);
    }

    #[test]
    fn timestamps_with_offset_and_nanos() {
        let utc = parse_timestamp("2021-06-01T15:00:00.123456789Z").unwrap();
        let offset = parse_timestamp("2021-06-01T17:00:00.123456789+02:00").unwrap();

        assert_eq!(utc, offset);
        assert_eq!(
            parse_timestamp("yesterday").unwrap_err().kind,
            ErrorKind::MalformedData
        );
    }

    #[test]
    fn serialize_then_value() {
        let sample = Sample { height: 3, power: 1 };

        let buf = json_serialize(&sample).unwrap();
        let value: serde_json::Value = json_deserialize(&buf).unwrap();

        assert_eq!(value["height"], 3);
        let back: Sample = json_from_value(value).unwrap();
        assert_eq!(back, sample);
    }
}
