use serde::{Deserialize, Serialize};

use crate::{error::DomainError, genre::Genre};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenreScore {
    pub genre: Genre,
    pub confidence: f32,
}

impl GenreScore {
    pub fn new(genre: Genre, confidence: f32) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DomainError::validation(format!(
                "confidence {confidence} outside [0, 1]"
            )));
        }
        Ok(Self { genre, confidence })
    }
}

/// Outcome of classifying one media file.
///
/// `top_3_genres` holds the leading entries of the full distribution and is
/// never renormalised, so its confidences usually sum to less than one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub genre: Option<Genre>,
    pub confidence: f32,
    pub top_3_genres: Vec<GenreScore>,
    pub has_audio: bool,
}

impl ClassificationResult {
    /// The uniform degraded result used for silent media and every processing failure.
    pub fn failure() -> Self {
        Self {
            genre: None,
            confidence: 0.0,
            top_3_genres: Vec::new(),
            has_audio: false,
        }
    }

    /// Builds a successful result from scores ordered best first.
    pub fn from_ranked(ranked: Vec<GenreScore>) -> Result<Self, DomainError> {
        let best = *ranked
            .first()
            .ok_or_else(|| DomainError::validation("ranked genre list is empty"))?;
        if ranked
            .windows(2)
            .any(|pair| pair[0].confidence < pair[1].confidence)
        {
            return Err(DomainError::validation(
                "ranked genres must be ordered by descending confidence",
            ));
        }
        Ok(Self {
            genre: Some(best.genre),
            confidence: best.confidence,
            top_3_genres: ranked,
            has_audio: true,
        })
    }
}

/// JSON body returned by the classify endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResponse {
    pub filename: String,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

impl ClassificationResponse {
    pub fn new(filename: impl Into<String>, result: ClassificationResult) -> Self {
        Self {
            filename: filename.into(),
            result,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec_pretty(self).map_err(|err| DomainError::Serialization(err.to_string()))
    }
}
