//! Binary time codecs
//!
//! The four fixed-width binary time formats of IEC 60870-5-4: CP16 (elapsed
//! milliseconds), CP24 (time of minute), CP32 (time of day) and CP56 (full
//! date and time with a two-digit year). All fields are little-endian.
//!
//! The two-digit year is disambiguated with a fixed pivot: years 00..=69 map
//! to 2000..=2069, years 70..=99 map to 1970..=1999.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

fn check(src: &[u8], offset: usize, size: usize) -> Result<(), CodecError> {
    if offset + size > src.len() {
        return Err(CodecError::Truncated);
    }
    Ok(())
}

/// CP16Time2a: elapsed time in milliseconds (0..=65535)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cp16Time2a(pub u16);

impl Cp16Time2a {
    pub const SIZE: usize = 2;

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        check(dst, offset, Self::SIZE)?;
        dst[offset..offset + 2].copy_from_slice(&self.0.to_le_bytes());
        Ok(offset + Self::SIZE)
    }

    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        check(src, offset, Self::SIZE)?;
        let value = u16::from_le_bytes([src[offset], src[offset + 1]]);
        Ok((Self(value), offset + Self::SIZE))
    }

    pub fn millis(&self) -> u16 {
        self.0
    }
}

/// CP24Time2a: time of the current minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cp24Time2a {
    /// Millisecond within the second (0..=999)
    pub millisecond: u16,
    /// Second within the minute (0..=59)
    pub second: u8,
    /// Minute within the hour (0..=59)
    pub minute: u8,
    /// Value was provided by a substituting source
    pub substituted: bool,
    /// Time value is invalid
    pub invalid: bool,
}

impl Cp24Time2a {
    pub const SIZE: usize = 3;

    pub fn new(minute: u8, second: u8, millisecond: u16) -> Self {
        Self {
            millisecond,
            second,
            minute,
            substituted: false,
            invalid: false,
        }
    }

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        check(dst, offset, Self::SIZE)?;
        let ms = u16::from(self.second) * 1000 + self.millisecond;
        dst[offset..offset + 2].copy_from_slice(&ms.to_le_bytes());
        let mut b2 = self.minute & 0x3f;
        if self.substituted {
            b2 |= 0x40;
        }
        if self.invalid {
            b2 |= 0x80;
        }
        dst[offset + 2] = b2;
        Ok(offset + Self::SIZE)
    }

    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        check(src, offset, Self::SIZE)?;
        let ms = u16::from_le_bytes([src[offset], src[offset + 1]]);
        let b2 = src[offset + 2];
        Ok((
            Self {
                millisecond: ms % 1000,
                second: (ms / 1000) as u8,
                minute: b2 & 0x3f,
                substituted: b2 & 0x40 != 0,
                invalid: b2 & 0x80 != 0,
            },
            offset + Self::SIZE,
        ))
    }
}

/// CP32Time2a: time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cp32Time2a {
    pub millisecond: u16,
    pub second: u8,
    pub minute: u8,
    /// Hour of the day (0..=23)
    pub hour: u8,
    /// Daylight saving time flag
    pub summer_time: bool,
    pub substituted: bool,
    pub invalid: bool,
}

impl Cp32Time2a {
    pub const SIZE: usize = 4;

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        check(dst, offset, Self::SIZE)?;
        let short = Cp24Time2a {
            millisecond: self.millisecond,
            second: self.second,
            minute: self.minute,
            substituted: self.substituted,
            invalid: self.invalid,
        };
        short.encode(dst, offset)?;
        let mut b3 = self.hour & 0x1f;
        if self.summer_time {
            b3 |= 0x80;
        }
        dst[offset + 3] = b3;
        Ok(offset + Self::SIZE)
    }

    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        check(src, offset, Self::SIZE)?;
        let (short, _) = Cp24Time2a::decode(src, offset)?;
        let b3 = src[offset + 3];
        Ok((
            Self {
                millisecond: short.millisecond,
                second: short.second,
                minute: short.minute,
                hour: b3 & 0x1f,
                summer_time: b3 & 0x80 != 0,
                substituted: short.substituted,
                invalid: short.invalid,
            },
            offset + Self::SIZE,
        ))
    }
}

/// CP56Time2a: full date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cp56Time2a {
    /// Millisecond within the second (0..=999)
    pub millisecond: u16,
    /// Second within the minute (0..=59)
    pub second: u8,
    /// Minute within the hour (0..=59)
    pub minute: u8,
    /// Hour of the day (0..=23)
    pub hour: u8,
    /// Day of the month (1..=31)
    pub day_of_month: u8,
    /// Day of the week (1 = Monday .. 7 = Sunday, 0 = not used)
    pub day_of_week: u8,
    /// Month (1..=12)
    pub month: u8,
    /// Two-digit year (0..=99); 00..=69 is 2000..=2069, 70..=99 is 1970..=1999
    pub year: u8,
    /// Daylight saving time flag
    pub summer_time: bool,
    /// Value was provided by a substituting source
    pub substituted: bool,
    /// Time value is invalid
    pub invalid: bool,
}

impl Cp56Time2a {
    pub const SIZE: usize = 7;

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        check(dst, offset, Self::SIZE)?;
        let ms = u16::from(self.second) * 1000 + self.millisecond;
        dst[offset..offset + 2].copy_from_slice(&ms.to_le_bytes());
        let mut b2 = self.minute & 0x3f;
        if self.substituted {
            b2 |= 0x40;
        }
        if self.invalid {
            b2 |= 0x80;
        }
        dst[offset + 2] = b2;
        let mut b3 = self.hour & 0x1f;
        if self.summer_time {
            b3 |= 0x80;
        }
        dst[offset + 3] = b3;
        dst[offset + 4] = (self.day_of_month & 0x1f) | ((self.day_of_week & 0x07) << 5);
        dst[offset + 5] = self.month & 0x0f;
        dst[offset + 6] = self.year % 100;
        Ok(offset + Self::SIZE)
    }

    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        check(src, offset, Self::SIZE)?;
        let ms = u16::from_le_bytes([src[offset], src[offset + 1]]);
        let b2 = src[offset + 2];
        let b3 = src[offset + 3];
        let b4 = src[offset + 4];
        Ok((
            Self {
                millisecond: ms % 1000,
                second: (ms / 1000) as u8,
                minute: b2 & 0x3f,
                hour: b3 & 0x1f,
                day_of_month: b4 & 0x1f,
                day_of_week: (b4 >> 5) & 0x07,
                month: src[offset + 5] & 0x0f,
                year: src[offset + 6] & 0x7f,
                summer_time: b3 & 0x80 != 0,
                substituted: b2 & 0x40 != 0,
                invalid: b2 & 0x80 != 0,
            },
            offset + Self::SIZE,
        ))
    }

    /// Build from a UTC millisecond timestamp
    pub fn from_millis(millis: u64) -> Self {
        let dt = DateTime::from_timestamp_millis(millis as i64).unwrap_or_default();
        Self::from_datetime(&dt.naive_utc())
    }

    /// UTC millisecond timestamp using the documented century pivot
    ///
    /// Returns 0 when the stored fields do not form a valid calendar date.
    pub fn to_millis(&self) -> u64 {
        self.to_datetime()
            .map(|dt| dt.and_utc().timestamp_millis().max(0) as u64)
            .unwrap_or(0)
    }

    /// Build from a calendar date and time (UTC)
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            millisecond: dt.and_utc().timestamp_subsec_millis() as u16,
            second: dt.second() as u8,
            minute: dt.minute() as u8,
            hour: dt.hour() as u8,
            day_of_month: dt.day() as u8,
            day_of_week: dt.weekday().number_from_monday() as u8,
            month: dt.month() as u8,
            year: (dt.year() % 100) as u8,
            summer_time: false,
            substituted: false,
            invalid: false,
        }
    }

    /// Calendar date and time, if the stored fields form a valid date
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let year = if self.year < 70 {
            2000 + i32::from(self.year)
        } else {
            1900 + i32::from(self.year)
        };
        NaiveDate::from_ymd_opt(year, u32::from(self.month), u32::from(self.day_of_month))?
            .and_hms_milli_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
                u32::from(self.millisecond),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp16_round_trip() {
        let mut buf = [0u8; 2];
        Cp16Time2a(40000).encode(&mut buf, 0).unwrap();
        assert_eq!(buf, [0x40, 0x9c]);
        let (decoded, next) = Cp16Time2a::decode(&buf, 0).unwrap();
        assert_eq!(decoded.millis(), 40000);
        assert_eq!(next, 2);
    }

    #[test]
    fn cp24_packs_seconds_into_milliseconds() {
        let time = Cp24Time2a::new(30, 45, 250);
        let mut buf = [0u8; 3];
        time.encode(&mut buf, 0).unwrap();
        // 45250 ms = 0xb0c2, minute 30
        assert_eq!(buf, [0xc2, 0xb0, 0x1e]);
        let (decoded, _) = Cp24Time2a::decode(&buf, 0).unwrap();
        assert_eq!(decoded, time);
    }

    #[test]
    fn cp24_flags() {
        let time = Cp24Time2a {
            invalid: true,
            substituted: true,
            ..Cp24Time2a::new(59, 0, 0)
        };
        let mut buf = [0u8; 3];
        time.encode(&mut buf, 0).unwrap();
        assert_eq!(buf[2], 0x3b | 0x40 | 0x80);
    }

    #[test]
    fn cp56_known_encoding() {
        // 2023-07-04 (a Tuesday) 10:30:45.250, summer time
        let time = Cp56Time2a {
            millisecond: 250,
            second: 45,
            minute: 30,
            hour: 10,
            day_of_month: 4,
            day_of_week: 2,
            month: 7,
            year: 23,
            summer_time: true,
            substituted: false,
            invalid: false,
        };
        let mut buf = [0u8; 7];
        time.encode(&mut buf, 0).unwrap();
        assert_eq!(buf, [0xc2, 0xb0, 0x1e, 0x8a, 0x44, 0x07, 0x17]);
        let (decoded, _) = Cp56Time2a::decode(&buf, 0).unwrap();
        assert_eq!(decoded, time);
    }

    #[test]
    fn cp56_millis_round_trip() {
        let stamps: [u64; 5] = [
            0,                 // epoch
            1_000,             // first second
            1_688_466_645_250, // 2023-07-04 10:30:45.250
            2_524_608_000_000, // 2050-01-01
            3_124_224_000_000, // 2069-01-01
        ];
        for ms in stamps {
            let time = Cp56Time2a::from_millis(ms);
            assert_eq!(time.to_millis(), ms, "timestamp {}", ms);
        }
    }

    #[test]
    fn cp56_century_pivot() {
        let in_1999 = Cp56Time2a {
            year: 99,
            month: 12,
            day_of_month: 31,
            ..Default::default()
        };
        assert_eq!(in_1999.to_datetime().unwrap().year(), 1999);
        let in_2069 = Cp56Time2a {
            year: 69,
            month: 1,
            day_of_month: 1,
            ..Default::default()
        };
        assert_eq!(in_2069.to_datetime().unwrap().year(), 2069);
    }

    #[test]
    fn cp56_day_of_week_from_datetime() {
        // 2023-07-04 was a Tuesday
        let time = Cp56Time2a::from_millis(1_688_466_645_250);
        assert_eq!(time.day_of_week, 2);
        assert_eq!(time.hour, 10);
        assert_eq!(time.minute, 30);
        assert_eq!(time.second, 45);
        assert_eq!(time.millisecond, 250);
    }

    #[test]
    fn cp56_invalid_date_yields_no_datetime() {
        let time = Cp56Time2a::default(); // month 0, day 0
        assert_eq!(time.to_datetime(), None);
        assert_eq!(time.to_millis(), 0);
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        let buf = [0u8; 6];
        assert_eq!(Cp56Time2a::decode(&buf, 0), Err(CodecError::Truncated));
        let mut buf = [0u8; 6];
        assert_eq!(
            Cp56Time2a::default().encode(&mut buf, 0),
            Err(CodecError::Truncated)
        );
    }
}
