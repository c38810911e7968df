use derive_more::Display;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One named, typed unit of content read out of a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleRecord {
    pub name: String,
    /// Path the record was packed under, when the bundle records one.
    pub container: Option<PathBuf>,
    pub payload: Payload,
}

impl BundleRecord {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            container: None,
            payload,
        }
    }

    pub fn with_container(mut self, container: impl Into<PathBuf>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }
}

/// Decoded contents of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Image(DynamicImage),
    Sprite(DynamicImage),
    TextBlob(Vec<u8>),
    StructuredTree(serde_json::Value),
    /// Sample name to encoded audio bytes.
    AudioSample(BTreeMap<String, Vec<u8>>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Image(_) => PayloadKind::Image,
            Self::Sprite(_) => PayloadKind::Sprite,
            Self::TextBlob(_) => PayloadKind::TextBlob,
            Self::StructuredTree(_) => PayloadKind::StructuredTree,
            Self::AudioSample(_) => PayloadKind::AudioSample,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    #[display("image")]
    Image,
    #[display("sprite")]
    Sprite,
    #[display("text")]
    #[serde(rename = "text")]
    TextBlob,
    #[display("tree")]
    #[serde(rename = "tree")]
    StructuredTree,
    #[display("audio")]
    #[serde(rename = "audio")]
    AudioSample,
}
