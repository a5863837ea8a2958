use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

pub const NUM_GENRES: usize = 10;

/// The fixed label set of the classifier.
///
/// Declaration order is the model's output order: logit `i` scores
/// `Genre::ALL[i]`. Reordering variants silently breaks every trained artifact.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Rock,
    Reggae,
    Pop,
    Metal,
    Jazz,
    Hiphop,
    Disco,
    Country,
    Classical,
    Blues,
}

impl Genre {
    pub const ALL: [Genre; NUM_GENRES] = [
        Genre::Rock,
        Genre::Reggae,
        Genre::Pop,
        Genre::Metal,
        Genre::Jazz,
        Genre::Hiphop,
        Genre::Disco,
        Genre::Country,
        Genre::Classical,
        Genre::Blues,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Rock => "rock",
            Genre::Reggae => "reggae",
            Genre::Pop => "pop",
            Genre::Metal => "metal",
            Genre::Jazz => "jazz",
            Genre::Hiphop => "hiphop",
            Genre::Disco => "disco",
            Genre::Country => "country",
            Genre::Classical => "classical",
            Genre::Blues => "blues",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|genre| genre.as_str() == needle)
            .ok_or_else(|| DomainError::UnknownGenre(s.to_string()))
    }
}
