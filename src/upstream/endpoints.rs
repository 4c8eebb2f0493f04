/// every upstream host we talk to, plus the suffixes the proxy endpoints accept
///
/// production values come from `Default`, tests point everything at a fake service with
/// `Endpoints::for_service`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// the public site, serves the web shell we scrape the client id from
    pub site: String,
    pub api: String,
    /// where the script bundle lives
    pub assets: String,
    pub images: String,
    pub images_alt: String,
    pub hls: String,
    pub hls_aac: String,
    /// allowlist for images and mp3 hls, e.g. `.sndcdn.com`
    pub cdn_suffix: String,
    /// allowlist for the fragmented mp4 variant, e.g. `.soundcloud.cloud`
    pub cloud_suffix: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            site: "soundcloud.com".to_string(),
            api: "api-v2.soundcloud.com".to_string(),
            assets: "a-v2.sndcdn.com".to_string(),
            images: "i1.sndcdn.com".to_string(),
            images_alt: "al.sndcdn.com".to_string(),
            hls: "cf-hls-media.sndcdn.com".to_string(),
            hls_aac: "playback.media-streaming.soundcloud.cloud".to_string(),
            cdn_suffix: ".sndcdn.com".to_string(),
            cloud_suffix: ".soundcloud.cloud".to_string(),
        }
    }
}

impl Endpoints {
    /// `for_service("example")` gives `example.com`, `a-v2.example.cdn`,
    /// `playback.media-streaming.example.cloud` and so on
    pub fn for_service(name: &str) -> Self {
        let cdn = format!("{}.cdn", name);
        let cloud = format!("{}.cloud", name);

        Self {
            site: format!("{}.com", name),
            api: format!("api-v2.{}.com", name),
            assets: format!("a-v2.{}", cdn),
            images: format!("i1.{}", cdn),
            images_alt: format!("al.{}", cdn),
            hls: format!("cf-hls-media.{}", cdn),
            hls_aac: format!("playback.media-streaming.{}", cloud),
            cdn_suffix: format!(".{}", cdn),
            cloud_suffix: format!(".{}", cloud),
        }
    }

    pub fn api_url(&self, path_and_query: &str) -> String {
        format!("https://{}{}", self.api, path_and_query)
    }

    /// the full site url of a permalink, this is what `/resolve` takes
    pub fn site_url(&self, permalink: &str) -> String {
        format!("https://{}/{}", self.site, permalink)
    }
}
