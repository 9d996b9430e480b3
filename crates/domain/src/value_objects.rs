use serde::{Deserialize, Serialize};

use cascade_core::{CascadeError, CascadeResult};

/// Brazilian plate layout detected during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateKind {
    /// Three letters, four digits (pre-2018).
    Legacy,
    /// Three letters, digit, letter, two digits.
    Mercosul,
}

/// A validated, normalized vehicle plate.
///
/// Normalization strips everything but ASCII alphanumerics and uppercases,
/// so `"abc-1234"` and `"ABC1234"` are the same plate and the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Plate(String);

impl Plate {
    pub fn parse(raw: &str) -> CascadeResult<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();

        if Self::kind_of(&normalized).is_none() {
            return Err(CascadeError::validation_error(format!(
                "invalid plate: {raw}"
            )));
        }

        Ok(Plate(normalized))
    }

    fn kind_of(normalized: &str) -> Option<PlateKind> {
        let bytes = normalized.as_bytes();
        if bytes.len() != 7 {
            return None;
        }
        let letter = |b: u8| b.is_ascii_uppercase();
        let digit = |b: u8| b.is_ascii_digit();

        if !(letter(bytes[0]) && letter(bytes[1]) && letter(bytes[2])) {
            return None;
        }
        if digit(bytes[3]) && digit(bytes[4]) && digit(bytes[5]) && digit(bytes[6]) {
            return Some(PlateKind::Legacy);
        }
        if digit(bytes[3]) && letter(bytes[4]) && digit(bytes[5]) && digit(bytes[6]) {
            return Some(PlateKind::Mercosul);
        }
        None
    }

    pub fn kind(&self) -> PlateKind {
        // Invariant: the constructor only admits one of the two layouts.
        Self::kind_of(&self.0).unwrap_or(PlateKind::Legacy)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form: legacy plates gain the conventional dash, Mercosul
    /// plates render as-is.
    pub fn formatted(&self) -> String {
        match self.kind() {
            PlateKind::Legacy => format!("{}-{}", &self.0[..3], &self.0[3..]),
            PlateKind::Mercosul => self.0.clone(),
        }
    }
}

impl std::fmt::Display for Plate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Plate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Plate::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A validated Brazilian national id (CPF), stored as its 11 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NationalId(String);

impl NationalId {
    pub fn parse(raw: &str) -> CascadeResult<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.len() != 11 {
            return Err(CascadeError::validation_error(format!(
                "national id must have 11 digits: {raw}"
            )));
        }

        let first = digits.as_bytes()[0];
        if digits.bytes().all(|b| b == first) {
            return Err(CascadeError::validation_error(
                "national id with repeated digits",
            ));
        }

        if !Self::check_digits_valid(&digits) {
            return Err(CascadeError::validation_error(format!(
                "national id check digits do not match: {raw}"
            )));
        }

        Ok(NationalId(digits))
    }

    /// Standard mod-11 verification of both check digits.
    fn check_digits_valid(digits: &str) -> bool {
        let d: Vec<u32> = digits.bytes().map(|b| (b - b'0') as u32).collect();

        let mut sum: u32 = 0;
        for (i, value) in d.iter().take(9).enumerate() {
            sum += value * (10 - i as u32);
        }
        let mut rest = (sum * 10) % 11;
        if rest >= 10 {
            rest = 0;
        }
        if rest != d[9] {
            return false;
        }

        let mut sum: u32 = 0;
        for (i, value) in d.iter().take(10).enumerate() {
            sum += value * (11 - i as u32);
        }
        let mut rest = (sum * 10) % 11;
        if rest >= 10 {
            rest = 0;
        }
        rest == d[10]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form: `###.###.###-##`.
    pub fn formatted(&self) -> String {
        format!(
            "{}.{}.{}-{}",
            &self.0[..3],
            &self.0[3..6],
            &self.0[6..9],
            &self.0[9..]
        )
    }
}

impl std::fmt::Display for NationalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NationalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NationalId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
