//! Single-record converters

use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::{ConvertError, ConvertResult};

/// Converts one record to its textual token and back.
///
/// `from_token(&to_token(r)?)` must reproduce the record's identity and
/// every field the caller cares about. Tokens written to a single-file
/// store must not contain that store's separator.
pub trait RecordConverter<T> {
    /// Serializes `record` into a token.
    fn to_token(&self, record: &T) -> ConvertResult<String>;

    /// Parses a token produced by `to_token`.
    fn from_token(&self, token: &str) -> ConvertResult<T>;
}

/// Converter built from a pair of closures.
#[derive(Clone)]
pub struct FnConverter<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnConverter<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<T, E, D> RecordConverter<T> for FnConverter<E, D>
where
    E: Fn(&T) -> String,
    D: Fn(&str) -> ConvertResult<T>,
{
    fn to_token(&self, record: &T) -> ConvertResult<String> {
        Ok((self.encode)(record))
    }

    fn from_token(&self, token: &str) -> ConvertResult<T> {
        (self.decode)(token)
    }
}

impl<E, D> fmt::Debug for FnConverter<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter").finish_non_exhaustive()
    }
}

/// Converter for types with a `Display` / `FromStr` pair.
pub struct DisplayConverter<T>(PhantomData<fn() -> T>);

impl<T> DisplayConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DisplayConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DisplayConverter<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DisplayConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DisplayConverter")
    }
}

impl<T> RecordConverter<T> for DisplayConverter<T>
where
    T: Display + FromStr,
    T::Err: Display,
{
    fn to_token(&self, record: &T) -> ConvertResult<String> {
        Ok(record.to_string())
    }

    fn from_token(&self, token: &str) -> ConvertResult<T> {
        token
            .parse()
            .map_err(|e: T::Err| ConvertError::malformed(token, e.to_string()))
    }
}

/// Converter storing each record as one compact JSON document.
///
/// Compact JSON escapes control characters inside strings, so tokens never
/// contain a raw newline and are safe with a `"\n"` separator.
pub struct JsonConverter<T>(PhantomData<fn() -> T>);

impl<T> JsonConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonConverter<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonConverter")
    }
}

impl<T> RecordConverter<T> for JsonConverter<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_token(&self, record: &T) -> ConvertResult<String> {
        Ok(serde_json::to_string(record)?)
    }

    fn from_token(&self, token: &str) -> ConvertResult<T> {
        Ok(serde_json::from_str(token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    #[test]
    fn test_fn_converter_round_trip() {
        let converter = FnConverter::new(
            |n: &Note| format!("{} | {}", n.id, n.text),
            |token: &str| -> ConvertResult<Note> {
                let (id, text) = token
                    .split_once(" | ")
                    .ok_or_else(|| ConvertError::malformed(token, "missing ' | '"))?;
                let id = id
                    .parse()
                    .map_err(|_| ConvertError::malformed(token, "id is not a number"))?;
                Ok(Note {
                    id,
                    text: text.to_string(),
                })
            },
        );

        let note = Note {
            id: 7,
            text: "seven".into(),
        };
        let token = converter.to_token(&note).unwrap();
        assert_eq!(token, "7 | seven");
        assert_eq!(converter.from_token(&token).unwrap(), note);
        assert!(converter.from_token("seven").is_err());
    }

    #[test]
    fn test_display_converter() {
        let converter = DisplayConverter::<u64>::new();
        assert_eq!(converter.to_token(&42).unwrap(), "42");
        assert_eq!(converter.from_token("42").unwrap(), 42);

        let err = converter.from_token("forty-two").unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { .. }));
    }

    #[test]
    fn test_json_converter_escapes_newlines() {
        let converter = JsonConverter::<Note>::new();
        let note = Note {
            id: 1,
            text: "line one\nline two".into(),
        };

        let token = converter.to_token(&note).unwrap();
        assert!(!token.contains('\n'));
        assert_eq!(converter.from_token(&token).unwrap(), note);
    }

    #[test]
    fn test_json_converter_rejects_garbage() {
        let converter = JsonConverter::<Note>::new();
        assert!(matches!(
            converter.from_token("{not json"),
            Err(ConvertError::Json(_))
        ));
    }
}
