use sanity_config::{Server, ServerConfig};

const CN_VERSION_URL: &str = "https://ak-conf.hypergryph.com/config/prod/official/Android/version";
const CN_ASSET_BASE_URL: &str = "https://ak.hycdn.cn/assetbundle/official/Android";
const EN_ASSET_BASE_URL: &str = "https://ark-us-static-online.yo-star.com/assetbundle/official/Android";
const JP_ASSET_BASE_URL: &str = "https://ark-jp-static-online.yo-star.com/assetbundle/official/Android";
const KR_ASSET_BASE_URL: &str = "https://ark-kr-static-online-1300509597.yo-star.com/assetbundle/official/Android";

/// Suffixes removed from an asset path when building its download key.
const STRIPPED_SUFFIXES: [&str; 3] = [".ab", ".bin", ".mp4"];

/// URLs of one server's content endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub version_url: String,
    pub asset_base_url: String,
}

impl Endpoints {
    /// Built-in endpoints of `server`.
    pub fn official(server: Server) -> Self {
        let asset_base_url = match server {
            Server::Cn => CN_ASSET_BASE_URL,
            Server::En => EN_ASSET_BASE_URL,
            Server::Jp => JP_ASSET_BASE_URL,
            Server::Kr => KR_ASSET_BASE_URL,
        };
        let version_url = match server {
            Server::Cn => CN_VERSION_URL.to_string(),
            _ => format!("{asset_base_url}/version"),
        };
        Self {
            version_url,
            asset_base_url: asset_base_url.to_string(),
        }
    }

    /// Built-in endpoints of `server` with any overrides from its configuration.
    pub fn for_server(server: Server, config: &ServerConfig) -> Self {
        let official = Self::official(server);
        Self {
            version_url: config.version_url.clone().unwrap_or(official.version_url),
            asset_base_url: config.asset_base_url.clone().unwrap_or(official.asset_base_url),
        }
    }

    pub fn manifest_url(&self, resource_version: &str) -> String {
        format!("{}/assets/{resource_version}/hot_update_list.json", self.base())
    }

    pub fn asset_url(&self, resource_version: &str, path: &str) -> String {
        format!("{}/assets/{resource_version}/{}", self.base(), download_key(path))
    }

    fn base(&self) -> &str {
        self.asset_base_url.trim_end_matches('/')
    }
}

/// Flatten a logical asset path into the file name the server publishes it
/// under.
///
/// # Examples
///
/// ```
/// use sanity_fetch::download_key;
/// assert_eq!(download_key("chararts/char_002_amiya.ab"), "chararts_char_002_amiya.dat");
/// assert_eq!(download_key("avg/imgs/bg#1.ab"), "avg_imgs_bg__1.dat");
/// ```
pub fn download_key(path: &str) -> String {
    let mut key = path.to_string();
    for suffix in STRIPPED_SUFFIXES {
        key = key.replace(suffix, "");
    }
    let key = key.replace('/', "_").replace('#', "__");
    format!("{key}.dat")
}
