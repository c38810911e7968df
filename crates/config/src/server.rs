use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A regional deployment of the content servers.
///
/// Keys every per-server configuration block, cache slice, and output
/// directory. Serialized in upper case (`"CN"`), but lower case keys are
/// accepted so that environment overrides (which figment lower-cases) still
/// resolve.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Server {
    #[display("CN")]
    #[serde(rename = "CN", alias = "cn")]
    Cn,
    #[display("EN")]
    #[serde(rename = "EN", alias = "en")]
    En,
    #[display("JP")]
    #[serde(rename = "JP", alias = "jp")]
    Jp,
    #[display("KR")]
    #[serde(rename = "KR", alias = "kr")]
    Kr,
}

impl Server {
    pub const ALL: [Server; 4] = [Server::Cn, Server::En, Server::Jp, Server::Kr];

    /// Name of the server's directory inside the output tree.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Server::Cn => "cn",
            Server::En => "en",
            Server::Jp => "jp",
            Server::Kr => "kr",
        }
    }
}
