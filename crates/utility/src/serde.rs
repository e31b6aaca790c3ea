//! Serde helpers for the upstream JSON payload shapes.

pub mod date_time {
    use core::fmt;

    use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone as _};
    use serde::{
        de::{self, Error, IntoDeserializer, Unexpected, Visitor},
        Deserialize as _, Deserializer,
    };

    /// SimRail timestamps arrive as local time strings without an explicit
    /// offset; the offset is derived separately per server (spec §4.5b).
    pub fn deserialize_local<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let naive_datetime =
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S").map_err(Error::custom)?;
        let local_datetime = Local
            .from_local_datetime(&naive_datetime)
            .single()
            .ok_or_else(|| Error::custom("ambiguous local datetime"))?;
        Ok(local_datetime)
    }

    pub fn deserialize_local_option<'de, D>(
        deserializer: D,
    ) -> Result<Option<DateTime<Local>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) => {
                let dt = deserialize_local(s.as_str().into_deserializer())?;
                Ok(Some(dt))
            }
            None => Ok(None),
        }
    }

    pub fn deserialize_yyyymmdd<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DateVisitor;

        impl<'de> Visitor<'de> for DateVisitor {
            type Value = NaiveDate;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string in the format YYYYMMDD")
            }

            fn visit_str<E>(self, value: &str) -> Result<NaiveDate, E>
            where
                E: de::Error,
            {
                NaiveDate::parse_from_str(value, "%Y%m%d")
                    .map_err(|_| de::Error::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_str(DateVisitor)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_local")]
            at: DateTime<Local>,
        }

        #[test]
        fn parses_local_timestamp() {
            let w: Wrapper = serde_json::from_value(json!({ "at": "2026-08-01T12:30:00" }))
                .expect("valid timestamp");
            assert_eq!(w.at.naive_local().to_string(), "2026-08-01 12:30:00");
        }
    }
}
