//! Comma-separated ID lists

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StoreError};

use super::Ksid;

/// An ordered sequence of IDs whose text form is `"A,B,C"`
///
/// Zero IDs are never emitted. When parsing, empty and zero elements are
/// skipped; any other malformed element is an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IdList(Vec<Ksid>);

impl IdList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, id: Ksid) {
        self.0.push(id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: Ksid) -> bool {
        self.0.contains(&id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ksid> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Ksid] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Ksid> {
        self.0
    }
}

impl From<Vec<Ksid>> for IdList {
    fn from(ids: Vec<Ksid>) -> Self {
        Self(ids)
    }
}

impl FromIterator<Ksid> for IdList {
    fn from_iter<I: IntoIterator<Item = Ksid>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a IdList {
    type Item = &'a Ksid;
    type IntoIter = std::slice::Iter<'a, Ksid>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in self.0.iter().filter(|id| !id.is_zero()) {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for IdList {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let mut ids = Vec::new();
        for element in s.split(',') {
            let element = element.trim();
            if element.is_empty() {
                continue;
            }
            let id = Ksid::decode(element)?;
            if !id.is_zero() {
                ids.push(id);
            }
        }
        Ok(Self(ids))
    }
}

impl Serialize for IdList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct IdListVisitor;

        impl<'de> Visitor<'de> for IdListVisitor {
            type Value = IdList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a comma-separated list of base32 IDs")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<IdList, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(IdListVisitor)
    }
}
