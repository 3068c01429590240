use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// A validated record name.
///
/// Names identify records within one kind of a library and are compared
/// exactly, case included. Any non-blank string is a valid name, spaces
/// included (`Sub plan A`, `Engine fuel consumption`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name(NonEmptyString);

impl Name {
    /// Creates a new `Name` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNameError` if the string is empty or contains only
    /// whitespace.
    pub fn new(s: String) -> Result<Self, InvalidNameError> {
        // Check non-empty
        let non_empty = NonEmptyString::new(s.clone()).map_err(|_| InvalidNameError(s.clone()))?;

        // Check at least one visible character
        if s.trim().is_empty() {
            return Err(InvalidNameError(s));
        }

        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Name {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Name {
    type Error = InvalidNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Name {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a string is empty or blank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid record name '{0}': must contain at least one non-whitespace character")]
pub struct InvalidNameError(String);

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("Ignition"; "single word")]
    #[test_case("Sub plan A"; "with spaces")]
    #[test_case("Engine fuel consumption"; "several words")]
    #[test_case("5V rail"; "leading digit")]
    #[test_case(" padded "; "surrounding whitespace kept")]
    fn valid_names(input: &str) {
        let name = Name::new(input.to_string()).unwrap();
        assert_eq!(name.as_str(), input);
    }

    #[test_case(""; "empty")]
    #[test_case(" "; "single space")]
    #[test_case("   "; "spaces only")]
    #[test_case("\t\n"; "other whitespace")]
    fn invalid_names(input: &str) {
        assert!(Name::new(input.to_string()).is_err());
    }

    #[test]
    fn names_are_case_sensitive() {
        let lower = Name::try_from("ignition").unwrap();
        let upper = Name::try_from("Ignition").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn names_order_lexicographically() {
        let a = Name::try_from("Engine quality").unwrap();
        let b = Name::try_from("Ignition").unwrap();
        assert!(a < b);
    }

    #[test]
    fn display_round_trip() {
        let name: Name = "Plan B".parse().unwrap();
        assert_eq!(name.to_string(), "Plan B");
        assert_eq!(name.to_string().parse::<Name>().unwrap(), name);
    }

    #[test]
    fn serializes_as_plain_string() {
        let name = Name::try_from("Main parent plan").unwrap();
        let yaml = serde_yaml::to_string(&name).unwrap();
        assert_eq!(yaml, "Main parent plan\n");
    }

    #[test]
    fn deserializes_from_plain_string() {
        let name: Name = serde_yaml::from_str("Engine quality").unwrap();
        assert_eq!(name.as_str(), "Engine quality");
    }

    #[test]
    fn deserializing_an_empty_string_fails() {
        let result: Result<Name, _> = serde_yaml::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn error_display() {
        let error = Name::new(String::new()).unwrap_err();
        assert_eq!(
            format!("{error}"),
            "Invalid record name '': must contain at least one non-whitespace character"
        );
    }
}
