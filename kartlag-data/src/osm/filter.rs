//! POI tag filter.
//!
//! Configured as an ordered list of `key` or `key=value` entries. An element
//! passes when any of its tags matches any entry; the matching tags become
//! the record's `key=value` categories in filter order.

use std::fmt;

use thiserror::Error;

/// Malformed filter entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The entry had a value but no key (`=value`).
    #[error("filter entry {entry:?} has no key")]
    MissingKey {
        /// The rejected entry.
        entry: String,
    },
    /// The entry had a separator but no value (`key=`).
    #[error("filter entry {entry:?} has no value")]
    MissingValue {
        /// The rejected entry.
        entry: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Key(String),
    KeyValue(String, String),
}

impl Predicate {
    fn matches(&self, key: &str, value: &str) -> bool {
        match self {
            Self::Key(wanted) => wanted == key,
            Self::KeyValue(wanted_key, wanted_value) => wanted_key == key && wanted_value == value,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::KeyValue(key, value) => write!(f, "{key}={value}"),
        }
    }
}

/// Ordered key / key-value whitelist for OSM elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoiFilter {
    predicates: Vec<Predicate>,
}

impl PoiFilter {
    /// Parse filter entries, ignoring blank ones.
    ///
    /// # Errors
    /// [`FilterError`] for entries of the form `=value` or `key=`; one bad
    /// entry rejects the whole filter.
    ///
    /// # Examples
    /// ```
    /// use kartlag_data::PoiFilter;
    ///
    /// let filter = PoiFilter::parse(["amenity=cinema", " ", "tourism"])?;
    /// assert!(filter.matches([("amenity", "cinema")]));
    /// assert!(filter.matches([("tourism", "museum")]));
    /// assert!(!filter.matches([("amenity", "bench")]));
    /// assert!(PoiFilter::parse(["=cinema"]).is_err());
    /// # Ok::<(), kartlag_data::FilterError>(())
    /// ```
    pub fn parse<I, S>(entries: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut predicates = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let predicate = match entry.split_once('=') {
                None => Predicate::Key(entry.to_owned()),
                Some((key, value)) => {
                    let (key, value) = (key.trim(), value.trim());
                    if key.is_empty() {
                        return Err(FilterError::MissingKey {
                            entry: entry.to_owned(),
                        });
                    }
                    if value.is_empty() {
                        return Err(FilterError::MissingValue {
                            entry: entry.to_owned(),
                        });
                    }
                    Predicate::KeyValue(key.to_owned(), value.to_owned())
                }
            };
            if !predicates.contains(&predicate) {
                predicates.push(predicate);
            }
        }
        Ok(Self { predicates })
    }

    /// Report whether the filter has no entries; an empty filter matches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Report whether any tag matches any entry.
    pub fn matches<'a, T>(&self, tags: T) -> bool
    where
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        tags.into_iter().any(|(key, value)| {
            self.predicates
                .iter()
                .any(|predicate| predicate.matches(key, value))
        })
    }

    /// The `key=value` categories the tags match, in filter order.
    pub fn categories<'a, T>(&self, tags: T) -> Vec<String>
    where
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let tags: Vec<(&str, &str)> = tags.into_iter().collect();
        let mut categories = Vec::new();
        for predicate in &self.predicates {
            for (key, value) in &tags {
                if predicate.matches(key, value) {
                    let category = format!("{key}={value}");
                    if !categories.contains(&category) {
                        categories.push(category);
                    }
                }
            }
        }
        categories
    }
}

impl fmt::Display for PoiFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, predicate) in self.predicates.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{predicate}")?;
        }
        Ok(())
    }
}
