//! Collection converter: tokens joined by a separator

use super::errors::{ConvertError, ConvertResult};
use super::record::RecordConverter;

/// Converts an ordered collection of records to one text and back.
///
/// The text form is `token1 SEP token2 SEP ... tokenN`. Splitting matches
/// the separator literally. An empty token cannot be told apart from a
/// trailing or doubled separator, so encoding refuses to produce one and
/// splitting skips empty pieces. The empty string is the empty collection.
#[derive(Debug, Clone)]
pub struct CollectionConverter<C> {
    converter: C,
    separator: String,
}

impl<C> CollectionConverter<C> {
    /// Creates a collection converter.
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::EmptySeparator` if `separator` is empty.
    pub fn new(converter: C, separator: impl Into<String>) -> ConvertResult<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(ConvertError::EmptySeparator);
        }
        Ok(Self {
            converter,
            separator,
        })
    }

    /// The single-record converter
    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// The element separator
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Splits `text` into its non-empty tokens, in order.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        text.split(self.separator.as_str())
            .filter(|token| !token.is_empty())
    }

    /// Joins already-serialized tokens.
    pub fn join_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> String {
        let mut text = String::new();
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                text.push_str(&self.separator);
            }
            text.push_str(token.as_ref());
        }
        text
    }

    /// Serializes one element, rejecting an empty token.
    pub fn encode_element<T>(&self, record: &T) -> ConvertResult<String>
    where
        C: RecordConverter<T>,
    {
        let token = self.converter.to_token(record)?;
        if token.is_empty() {
            return Err(ConvertError::EmptyToken);
        }
        Ok(token)
    }

    /// Serializes and joins `records`.
    pub fn join<T>(&self, records: &[T]) -> ConvertResult<String>
    where
        C: RecordConverter<T>,
    {
        let tokens = records
            .iter()
            .map(|record| self.encode_element(record))
            .collect::<ConvertResult<Vec<_>>>()?;
        Ok(self.join_tokens(&tokens))
    }

    /// Splits `text` and parses every token.
    pub fn split<T>(&self, text: &str) -> ConvertResult<Vec<T>>
    where
        C: RecordConverter<T>,
    {
        self.tokens(text)
            .map(|token| self.converter.from_token(token))
            .collect()
    }
}

impl<T, C> RecordConverter<Vec<T>> for CollectionConverter<C>
where
    C: RecordConverter<T>,
{
    fn to_token(&self, records: &Vec<T>) -> ConvertResult<String> {
        self.join(records)
    }

    fn from_token(&self, token: &str) -> ConvertResult<Vec<T>> {
        self.split(token)
    }
}
